use crate::error::{AppError, AppResult};
use crate::model::rental::{Rental, RentalStatus, rental_days, rental_total};
use crate::model::rental_extension::{
    ExtensionStatus, MIN_EXTENSION_REASON_LEN, MIN_REJECTION_REASON_LEN, RentalExtension, check_new_end_date,
    check_reason,
};
use crate::model::status::StatusFlow;
use crate::service::rental::{items_of, lock as lock_rental};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::ToSchema;

const EXTENSION_SELECT: &str = r#"
    SELECT id, rental_id, previous_end_date, new_end_date, reason, status, requested_by,
           reviewed_by, reviewed_at, rejection_reason, created_at
    FROM rental_extensions
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestExtension {
    #[schema(example = "2026-05-01", format = "date", value_type = String)]
    pub new_end_date: NaiveDate,
    #[schema(example = "Site work delayed by weather")]
    pub reason: String,
}

pub async fn get(pool: &MySqlPool, extension_id: u64) -> AppResult<RentalExtension> {
    sqlx::query_as::<_, RentalExtension>(&format!("{} WHERE id = ?", EXTENSION_SELECT))
        .bind(extension_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Rental extension not found"))
}

async fn lock(tx: &mut Transaction<'_, MySql>, extension_id: u64) -> AppResult<RentalExtension> {
    sqlx::query_as::<_, RentalExtension>(&format!("{} WHERE id = ? FOR UPDATE", EXTENSION_SELECT))
        .bind(extension_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Rental extension not found"))
}

/// Only rentals that are still running can be extended.
fn ensure_extendable(rental: &Rental) -> AppResult<()> {
    if RentalStatus::parse_stored(&rental.status)?.is_final() {
        return Err(AppError::unprocessable(format!("Cannot extend a {} rental", rental.status)));
    }
    Ok(())
}

pub async fn list_for_rental(pool: &MySqlPool, rental_id: u64) -> AppResult<Vec<RentalExtension>> {
    let rows = sqlx::query_as::<_, RentalExtension>(&format!(
        "{} WHERE rental_id = ? ORDER BY created_at DESC, id DESC",
        EXTENSION_SELECT
    ))
    .bind(rental_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// A rental has at most one pending extension at a time.
pub async fn request(
    pool: &MySqlPool,
    rental_id: u64,
    input: &RequestExtension,
    requested_by: u64,
) -> AppResult<RentalExtension> {
    let reason = check_reason(&input.reason, MIN_EXTENSION_REASON_LEN).map_err(AppError::bad_request)?;
    let today = Local::now().date_naive();

    let mut tx = pool.begin().await?;
    let rental = lock_rental(&mut tx, rental_id).await?;
    ensure_extendable(&rental)?;
    check_new_end_date(rental.expected_end_date, input.new_end_date, today).map_err(AppError::bad_request)?;

    let pending = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM rental_extensions WHERE rental_id = ? AND status = ?",
    )
    .bind(rental_id)
    .bind(ExtensionStatus::Pending.as_ref())
    .fetch_one(&mut *tx)
    .await?;
    if pending > 0 {
        return Err(AppError::conflict("Rental already has a pending extension"));
    }

    let extension_id = sqlx::query(
        r#"
        INSERT INTO rental_extensions (rental_id, previous_end_date, new_end_date, reason, status, requested_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(rental_id)
    .bind(rental.expected_end_date)
    .bind(input.new_end_date)
    .bind(reason)
    .bind(ExtensionStatus::Pending.as_ref())
    .bind(requested_by)
    .execute(&mut *tx)
    .await?
    .last_insert_id();
    tx.commit().await?;

    info!(extension_id, rental_id, new_end_date = %input.new_end_date, "Rental extension requested");
    get(pool, extension_id).await
}

/// Moves the rental's expected end and re-prices it over the longer period.
pub async fn approve(pool: &MySqlPool, extension_id: u64, reviewer: u64) -> AppResult<RentalExtension> {
    let mut tx = pool.begin().await?;
    let extension = lock(&mut tx, extension_id).await?;
    ExtensionStatus::ensure_transition(&extension.status, ExtensionStatus::Approved)?;

    let rental = lock_rental(&mut tx, extension.rental_id).await?;
    ensure_extendable(&rental)?;
    if extension.new_end_date <= rental.expected_end_date {
        return Err(AppError::unprocessable("Rental already ends on or after the requested date"));
    }

    let items = items_of(&mut *tx, rental.id).await?;
    let priced: Vec<(f64, u32)> = items.iter().map(|i| (i.daily_rate, i.quantity)).collect();
    let total = rental_total(&priced, rental_days(rental.start_date, extension.new_end_date));

    sqlx::query("UPDATE rentals SET expected_end_date = ?, total_amount = ? WHERE id = ?")
        .bind(extension.new_end_date)
        .bind(total)
        .bind(rental.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE rental_extensions SET status = ?, reviewed_by = ?, reviewed_at = NOW() WHERE id = ?")
        .bind(ExtensionStatus::Approved.as_ref())
        .bind(reviewer)
        .bind(extension_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(extension_id, rental_id = rental.id, total, "Rental extension approved");
    get(pool, extension_id).await
}

pub async fn reject(pool: &MySqlPool, extension_id: u64, reviewer: u64, reason: &str) -> AppResult<RentalExtension> {
    let reason = check_reason(reason, MIN_REJECTION_REASON_LEN).map_err(AppError::bad_request)?;

    let mut tx = pool.begin().await?;
    let extension = lock(&mut tx, extension_id).await?;
    ExtensionStatus::ensure_transition(&extension.status, ExtensionStatus::Rejected)?;

    sqlx::query(
        "UPDATE rental_extensions SET status = ?, reviewed_by = ?, reviewed_at = NOW(), rejection_reason = ? WHERE id = ?",
    )
    .bind(ExtensionStatus::Rejected.as_ref())
    .bind(reviewer)
    .bind(reason)
    .bind(extension_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(extension_id, reviewer, "Rental extension rejected");
    get(pool, extension_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn rental(status: RentalStatus) -> Rental {
        Rental {
            id: 3,
            rental_number: "RENT-2026-00003".to_string(),
            customer_name: "Al Noor Contracting".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            expected_end_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            actual_end_date: None,
            status: status.to_string(),
            total_amount: 0.0,
            notes: None,
            created_by: 1,
            completed_by: None,
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn finished_rentals_cannot_be_extended() {
        assert!(ensure_extendable(&rental(RentalStatus::Pending)).is_ok());
        assert!(ensure_extendable(&rental(RentalStatus::Active)).is_ok());
        assert!(matches!(
            ensure_extendable(&rental(RentalStatus::Completed)),
            Err(AppError::Unprocessable(_))
        ));
        assert!(ensure_extendable(&rental(RentalStatus::Cancelled)).is_err());
    }

    #[test]
    fn extension_re_prices_over_the_new_period() {
        let r = rental(RentalStatus::Active);
        let new_end = NaiveDate::from_ymd_opt(2026, 10, 31).unwrap();
        assert_eq!(rental_total(&[(1500.0, 1), (200.0, 2)], rental_days(r.start_date, new_end)), 57000.0);
    }
}
