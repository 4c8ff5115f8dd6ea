use crate::error::{AppError, AppResult};
use crate::model::equipment::EquipmentStatus;
use crate::model::rental::{
    RENTAL_NUMBER_PREFIX, Rental, RentalItem, RentalStatus, next_rental_number, rental_days, rental_total,
};
use crate::model::status::StatusFlow;
use crate::utils::db_utils::{BindValues, Filters, PageParams};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const RENTAL_SELECT: &str = r#"
    SELECT id, rental_number, customer_name, start_date, expected_end_date, actual_end_date,
           status, total_amount, notes, created_by, completed_by, created_at
    FROM rentals
"#;

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewRentalItem {
    pub equipment_id: u64,
    /// Defaults to the equipment's daily rate
    pub daily_rate: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub operator_id: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRental {
    #[schema(example = "Al Noor Contracting")]
    pub customer_name: String,
    #[schema(example = "2026-04-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-04-15", format = "date", value_type = String)]
    pub expected_end_date: NaiveDate,
    pub notes: Option<String>,
    pub items: Vec<NewRentalItem>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RentalQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    /// Matches rental number or customer
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RentalDetail {
    #[serde(flatten)]
    pub rental: Rental,
    pub items: Vec<RentalItem>,
    pub duration_days: i64,
    pub is_overdue: bool,
}

pub(crate) async fn items_of<'e, E>(executor: E, rental_id: u64) -> Result<Vec<RentalItem>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, RentalItem>(
        "SELECT id, rental_id, equipment_id, daily_rate, quantity, operator_id FROM rental_items WHERE rental_id = ? ORDER BY id",
    )
    .bind(rental_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn lock(tx: &mut Transaction<'_, MySql>, rental_id: u64) -> AppResult<Rental> {
    sqlx::query_as::<_, Rental>(&format!("{} WHERE id = ? FOR UPDATE", RENTAL_SELECT))
        .bind(rental_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Rental not found"))
}

pub async fn get(pool: &MySqlPool, rental_id: u64) -> AppResult<RentalDetail> {
    let rental = sqlx::query_as::<_, Rental>(&format!("{} WHERE id = ?", RENTAL_SELECT))
        .bind(rental_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Rental not found"))?;
    let items = items_of(pool, rental_id).await?;

    let today = Local::now().date_naive();
    Ok(RentalDetail {
        duration_days: rental.duration_days(),
        is_overdue: rental.is_overdue(today),
        rental,
        items,
    })
}

/// Newest number of a year's sequence, compared numerically so that
/// `-100000` sorts after `-99999`.
const LAST_RENTAL_NUMBER_SQL: &str = r#"
    SELECT rental_number
    FROM rentals
    WHERE rental_number LIKE CONCAT(?, '%')
    ORDER BY CAST(SUBSTRING(rental_number, ?) AS UNSIGNED) DESC
    LIMIT 1
    FOR UPDATE
"#;

/// Reserves the next number of this year's sequence; the newest row is locked
/// until the surrounding transaction ends.
async fn generate_rental_number(tx: &mut Transaction<'_, MySql>, today: NaiveDate) -> Result<String, sqlx::Error> {
    let year_prefix = format!("{}{}-", RENTAL_NUMBER_PREFIX, today.year());

    let last: Option<String> = sqlx::query_scalar(LAST_RENTAL_NUMBER_SQL)
        .bind(&year_prefix)
        .bind(year_prefix.len() as u32 + 1)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(next_rental_number(last.as_deref(), today))
}

pub async fn create(pool: &MySqlPool, input: &CreateRental, created_by: u64) -> AppResult<RentalDetail> {
    if input.customer_name.trim().is_empty() {
        return Err(AppError::bad_request("customer_name is required"));
    }
    if input.expected_end_date < input.start_date {
        return Err(AppError::bad_request("expected_end_date cannot be before start_date"));
    }
    if input.items.is_empty() {
        return Err(AppError::bad_request("A rental needs at least one item"));
    }
    if input.items.iter().any(|i| i.quantity == 0 || i.daily_rate.is_some_and(|r| r < 0.0)) {
        return Err(AppError::bad_request("Items need a positive quantity and a non-negative rate"));
    }

    let today = Local::now().date_naive();
    let mut tx = pool.begin().await?;

    // resolve default rates from the equipment itself
    let mut rates: HashMap<u64, f64> = HashMap::new();
    for item in &input.items {
        if rates.contains_key(&item.equipment_id) {
            continue;
        }
        let rate: Option<f64> = sqlx::query_scalar("SELECT daily_rate FROM equipment WHERE id = ?")
            .bind(item.equipment_id)
            .fetch_optional(&mut *tx)
            .await?;
        let rate = rate.ok_or_else(|| AppError::not_found(format!("Equipment {} not found", item.equipment_id)))?;
        rates.insert(item.equipment_id, rate);
    }

    let priced: Vec<(f64, u32)> = input
        .items
        .iter()
        .map(|i| {
            let listed = rates.get(&i.equipment_id).copied().unwrap_or_default();
            (i.daily_rate.unwrap_or(listed), i.quantity)
        })
        .collect();
    let total = rental_total(&priced, rental_days(input.start_date, input.expected_end_date));

    let rental_number = generate_rental_number(&mut tx, today).await?;
    debug!(rental_number = %rental_number, total, "Creating rental");

    let rental_id = sqlx::query(
        r#"
        INSERT INTO rentals
            (rental_number, customer_name, start_date, expected_end_date, status, total_amount, notes, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&rental_number)
    .bind(input.customer_name.trim())
    .bind(input.start_date)
    .bind(input.expected_end_date)
    .bind(RentalStatus::Pending.as_ref())
    .bind(total)
    .bind(&input.notes)
    .bind(created_by)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    for (item, (rate, quantity)) in input.items.iter().zip(&priced) {
        sqlx::query(
            "INSERT INTO rental_items (rental_id, equipment_id, daily_rate, quantity, operator_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(rental_id)
        .bind(item.equipment_id)
        .bind(rate)
        .bind(quantity)
        .bind(item.operator_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(rental_id, rental_number = %rental_number, "Rental created");
    get(pool, rental_id).await
}

/// Moves the rental's equipment from `from` to `to`, returning how many units moved.
async fn move_equipment(
    tx: &mut Transaction<'_, MySql>,
    rental_id: u64,
    from: EquipmentStatus,
    to: EquipmentStatus,
) -> Result<u64, sqlx::Error> {
    let moved = sqlx::query(
        r#"
        UPDATE equipment
        SET status = ?
        WHERE status = ? AND id IN (SELECT equipment_id FROM rental_items WHERE rental_id = ?)
        "#,
    )
    .bind(to.as_ref())
    .bind(from.as_ref())
    .bind(rental_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();
    Ok(moved)
}

/// Hands the equipment out; every piece must be available.
pub async fn activate(pool: &MySqlPool, rental_id: u64) -> AppResult<RentalDetail> {
    let mut tx = pool.begin().await?;
    let rental = lock(&mut tx, rental_id).await?;
    RentalStatus::ensure_transition(&rental.status, RentalStatus::Active)?;

    let busy: Vec<(u64, String)> = sqlx::query_as(
        r#"
        SELECT e.id, e.status
        FROM equipment e
        JOIN rental_items ri ON ri.equipment_id = e.id
        WHERE ri.rental_id = ?
        FOR UPDATE
        "#,
    )
    .bind(rental_id)
    .fetch_all(&mut *tx)
    .await?;

    if let Some((equipment_id, status)) = busy.iter().find(|(_, s)| s != EquipmentStatus::Available.as_ref()) {
        return Err(AppError::conflict(format!(
            "Equipment {} is not available (status: {})",
            equipment_id, status
        )));
    }

    move_equipment(&mut tx, rental_id, EquipmentStatus::Available, EquipmentStatus::Rented).await?;
    sqlx::query("UPDATE rentals SET status = ? WHERE id = ?")
        .bind(RentalStatus::Active.as_ref())
        .bind(rental_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(rental_id, "Rental activated");
    get(pool, rental_id).await
}

/// Closes an active rental today, re-prices it on the actual duration and releases the equipment.
pub async fn complete(pool: &MySqlPool, rental_id: u64, completed_by: u64) -> AppResult<RentalDetail> {
    let today = Local::now().date_naive();
    let mut tx = pool.begin().await?;
    let rental = lock(&mut tx, rental_id).await?;
    RentalStatus::ensure_transition(&rental.status, RentalStatus::Completed)?;

    let items = items_of(&mut *tx, rental_id).await?;
    let priced: Vec<(f64, u32)> = items.iter().map(|i| (i.daily_rate, i.quantity)).collect();
    let total = rental_total(&priced, rental_days(rental.start_date, today));

    sqlx::query(
        "UPDATE rentals SET status = ?, actual_end_date = ?, total_amount = ?, completed_by = ? WHERE id = ?",
    )
    .bind(RentalStatus::Completed.as_ref())
    .bind(today)
    .bind(total)
    .bind(completed_by)
    .bind(rental_id)
    .execute(&mut *tx)
    .await?;

    let released = move_equipment(&mut tx, rental_id, EquipmentStatus::Rented, EquipmentStatus::Available).await?;
    tx.commit().await?;

    info!(rental_id, released, total, "Rental completed");
    get(pool, rental_id).await
}

pub async fn cancel(pool: &MySqlPool, rental_id: u64) -> AppResult<RentalDetail> {
    let mut tx = pool.begin().await?;
    let rental = lock(&mut tx, rental_id).await?;
    let was = RentalStatus::ensure_transition(&rental.status, RentalStatus::Cancelled)?;

    sqlx::query("UPDATE rentals SET status = ? WHERE id = ?")
        .bind(RentalStatus::Cancelled.as_ref())
        .bind(rental_id)
        .execute(&mut *tx)
        .await?;

    let released = if was == RentalStatus::Active {
        move_equipment(&mut tx, rental_id, EquipmentStatus::Rented, EquipmentStatus::Available).await?
    } else {
        0
    };
    tx.commit().await?;

    info!(rental_id, released, "Rental cancelled");
    get(pool, rental_id).await
}

pub async fn list(pool: &MySqlPool, query: &RentalQuery, per_page_default: u32) -> AppResult<(Vec<Rental>, PageParams, i64)> {
    let page = PageParams::new(query.page, query.per_page, per_page_default);

    let mut filters = Filters::new();
    filters.push_opt("status = ?", query.status.as_deref());
    filters.search(&["rental_number", "customer_name"], query.search.as_deref());
    let where_clause = filters.where_clause();

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM rentals {}", where_clause))
        .bind_values(filters.values())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, Rental>(&format!(
        "{} {} ORDER BY id DESC LIMIT ? OFFSET ?",
        RENTAL_SELECT, where_clause
    ))
    .bind_values(filters.values())
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page, total))
}

/// Active rentals past their expected end date.
pub async fn overdue(pool: &MySqlPool) -> AppResult<Vec<Rental>> {
    let today = Local::now().date_naive();
    let rows = sqlx::query_as::<_, Rental>(&format!(
        "{} WHERE status = ? AND actual_end_date IS NULL AND expected_end_date < ? ORDER BY expected_end_date",
        RENTAL_SELECT
    ))
    .bind(RentalStatus::Active.as_ref())
    .bind(today)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_rental_number_is_picked_by_numeric_suffix() {
        let sql = LAST_RENTAL_NUMBER_SQL.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(sql.contains("ORDER BY CAST(SUBSTRING(rental_number, ?) AS UNSIGNED) DESC"));
        assert!(!sql.contains("ORDER BY rental_number"));
    }

    #[test]
    fn items_default_to_single_unit() {
        let input: CreateRental = serde_json::from_value(serde_json::json!({
            "customer_name": "Al Noor",
            "start_date": "2026-04-01",
            "expected_end_date": "2026-04-05",
            "items": [{ "equipment_id": 3 }, { "equipment_id": 4, "daily_rate": 250.0, "quantity": 2 }]
        }))
        .unwrap();

        assert_eq!(input.items[0].quantity, 1);
        assert_eq!(input.items[0].daily_rate, None);
        assert_eq!(input.items[1].daily_rate, Some(250.0));
    }
}
