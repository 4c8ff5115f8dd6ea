use crate::error::{AppError, AppResult};
use crate::model::employee::round2;
use crate::model::salary_increment::{
    IncrementStatus, IncrementTerms, IncrementType, SalaryComponents, SalaryIncrement, calculate_new_salary,
};
use crate::model::status::StatusFlow;
use crate::service::{employee, settings};
use crate::utils::db_utils::{BindValues, Filters, PageParams};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use std::collections::BTreeMap;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const INCREMENT_SELECT: &str = r#"
    SELECT id, employee_id, current_base_salary, current_food_allowance, current_housing_allowance,
           current_transport_allowance, new_base_salary, new_food_allowance, new_housing_allowance,
           new_transport_allowance, increment_type, increment_percentage, increment_amount, reason,
           effective_date, status, requested_by, approved_by, approved_at, rejected_by,
           rejection_reason, applied_at, notes, created_at
    FROM salary_increments
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIncrement {
    pub employee_id: u64,
    #[schema(example = "percentage")]
    pub increment_type: IncrementType,
    #[serde(flatten)]
    pub terms: IncrementTerms,
    #[schema(example = "Annual performance review")]
    pub reason: String,
    #[schema(example = "2026-07-01", format = "date", value_type = String)]
    pub effective_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct IncrementQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub status: Option<String>,
    pub increment_type: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub effective_date_from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub effective_date_to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct TypeBreakdown {
    pub increment_type: String,
    pub count: i64,
    pub avg_percentage: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IncrementStatistics {
    pub total_increments: i64,
    pub pending_increments: i64,
    pub approved_increments: i64,
    pub rejected_increments: i64,
    pub applied_increments: i64,
    /// Monthly raise summed over applied increments
    pub total_increment_amount: f64,
    pub average_increment_percentage: f64,
    pub by_type: Vec<TypeBreakdown>,
}

#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct TypeCost {
    pub count: u32,
    pub total_annual_cost: f64,
}

#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct ProjectedCost {
    pub total_pending_requests: u32,
    pub total_annual_increase: f64,
    pub by_type: BTreeMap<String, TypeCost>,
}

/// Annualized cost of the given pending increments, grouped by type.
pub fn project_annual_cost(pending: &[SalaryIncrement]) -> ProjectedCost {
    let mut projected = ProjectedCost::default();

    for increment in pending {
        let annual = increment.total_increment_amount() * 12.0;
        projected.total_pending_requests += 1;
        projected.total_annual_increase += annual;

        let entry = projected.by_type.entry(increment.increment_type.clone()).or_default();
        entry.count += 1;
        entry.total_annual_cost = round2(entry.total_annual_cost + annual);
    }

    projected.total_annual_increase = round2(projected.total_annual_increase);
    projected
}

pub async fn get(pool: &MySqlPool, increment_id: u64) -> AppResult<SalaryIncrement> {
    sqlx::query_as::<_, SalaryIncrement>(&format!("{} WHERE id = ?", INCREMENT_SELECT))
        .bind(increment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Salary increment not found"))
}

pub async fn create(pool: &MySqlPool, input: &CreateIncrement, requested_by: u64) -> AppResult<SalaryIncrement> {
    if input.reason.trim().is_empty() {
        return Err(AppError::bad_request("A reason is required"));
    }

    let employee = employee::get(pool, input.employee_id).await?;
    let current = SalaryComponents {
        base_salary: employee.basic_salary,
        food_allowance: employee.food_allowance,
        housing_allowance: employee.housing_allowance,
        transport_allowance: employee.transport_allowance,
    };
    let proposed = calculate_new_salary(current, input.increment_type, &input.terms)?;

    let increment_id = sqlx::query(
        r#"
        INSERT INTO salary_increments
            (employee_id, current_base_salary, current_food_allowance, current_housing_allowance,
             current_transport_allowance, new_base_salary, new_food_allowance, new_housing_allowance,
             new_transport_allowance, increment_type, increment_percentage, increment_amount, reason,
             effective_date, status, requested_by, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee.id)
    .bind(current.base_salary)
    .bind(current.food_allowance)
    .bind(current.housing_allowance)
    .bind(current.transport_allowance)
    .bind(proposed.base_salary)
    .bind(proposed.food_allowance)
    .bind(proposed.housing_allowance)
    .bind(proposed.transport_allowance)
    .bind(input.increment_type.as_ref())
    .bind(input.terms.increment_percentage)
    .bind(input.terms.increment_amount)
    .bind(input.reason.trim())
    .bind(input.effective_date)
    .bind(IncrementStatus::Pending.as_ref())
    .bind(requested_by)
    .bind(&input.notes)
    .execute(pool)
    .await?
    .last_insert_id();

    info!(increment_id, employee_id = employee.id, kind = %input.increment_type, "Salary increment requested");
    get(pool, increment_id).await
}

async fn lock(tx: &mut Transaction<'_, MySql>, increment_id: u64) -> AppResult<SalaryIncrement> {
    sqlx::query_as::<_, SalaryIncrement>(&format!("{} WHERE id = ? FOR UPDATE", INCREMENT_SELECT))
        .bind(increment_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Salary increment not found"))
}

/// Writes the proposed salary onto the employee and marks the increment applied.
async fn apply_locked(tx: &mut Transaction<'_, MySql>, increment: &SalaryIncrement) -> AppResult<()> {
    IncrementStatus::ensure_transition(&increment.status, IncrementStatus::Applied)?;

    let affected = sqlx::query(
        r#"
        UPDATE employees
        SET basic_salary = ?, food_allowance = ?, housing_allowance = ?, transport_allowance = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(increment.new_base_salary)
    .bind(increment.new_food_allowance)
    .bind(increment.new_housing_allowance)
    .bind(increment.new_transport_allowance)
    .bind(increment.employee_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::not_found("Employee not found"));
    }

    sqlx::query("UPDATE salary_increments SET status = ?, applied_at = NOW() WHERE id = ?")
        .bind(IncrementStatus::Applied.as_ref())
        .bind(increment.id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// A status-guarded update that touched nothing lost a race with another reviewer.
fn ensure_still_pending(affected: u64) -> AppResult<()> {
    if affected == 0 {
        return Err(AppError::conflict("Salary increment is no longer pending"));
    }
    Ok(())
}

/// Approves a pending increment; one already in effect is applied in the same transaction.
pub async fn approve(pool: &MySqlPool, increment_id: u64, approver: u64) -> AppResult<SalaryIncrement> {
    let today = Local::now().date_naive();
    let mut tx = pool.begin().await?;

    let mut increment = lock(&mut tx, increment_id).await?;
    IncrementStatus::ensure_transition(&increment.status, IncrementStatus::Approved)?;

    sqlx::query("UPDATE salary_increments SET status = ?, approved_by = ?, approved_at = NOW() WHERE id = ?")
        .bind(IncrementStatus::Approved.as_ref())
        .bind(approver)
        .bind(increment_id)
        .execute(&mut *tx)
        .await?;
    increment.status = IncrementStatus::Approved.to_string();

    let applied = increment.effective_date <= today;
    if applied {
        apply_locked(&mut tx, &increment).await?;
    }

    tx.commit().await?;
    info!(increment_id, approver, applied, "Salary increment approved");
    get(pool, increment_id).await
}

pub async fn reject(pool: &MySqlPool, increment_id: u64, rejector: u64, reason: Option<&str>) -> AppResult<SalaryIncrement> {
    let current = get(pool, increment_id).await?;
    IncrementStatus::ensure_transition(&current.status, IncrementStatus::Rejected)?;

    let affected = sqlx::query(
        "UPDATE salary_increments SET status = ?, rejected_by = ?, rejection_reason = ? WHERE id = ? AND status = ?",
    )
    .bind(IncrementStatus::Rejected.as_ref())
    .bind(rejector)
    .bind(reason.map(str::trim).filter(|r| !r.is_empty()))
    .bind(increment_id)
    .bind(IncrementStatus::Pending.as_ref())
    .execute(pool)
    .await?
    .rows_affected();
    ensure_still_pending(affected)?;

    info!(increment_id, rejector, "Salary increment rejected");
    get(pool, increment_id).await
}

pub async fn apply(pool: &MySqlPool, increment_id: u64) -> AppResult<SalaryIncrement> {
    let mut tx = pool.begin().await?;
    let increment = lock(&mut tx, increment_id).await?;
    apply_locked(&mut tx, &increment).await?;
    tx.commit().await?;

    info!(increment_id, employee_id = increment.employee_id, "Salary increment applied");
    get(pool, increment_id).await
}

/// Applies every approved increment effective on or before today, skipping failures.
pub async fn apply_due(pool: &MySqlPool) -> AppResult<Vec<SalaryIncrement>> {
    let today = Local::now().date_naive();

    let due: Vec<u64> = sqlx::query_scalar(
        "SELECT id FROM salary_increments WHERE status = ? AND effective_date <= ? ORDER BY effective_date, id",
    )
    .bind(IncrementStatus::Approved.as_ref())
    .bind(today)
    .fetch_all(pool)
    .await?;

    let mut applied = Vec::with_capacity(due.len());
    for increment_id in due {
        match apply(pool, increment_id).await {
            Ok(increment) => applied.push(increment),
            Err(e) => error!(increment_id, error = %e, "Failed to apply salary increment"),
        }
    }

    info!(count = applied.len(), "Due salary increments applied");
    Ok(applied)
}

pub async fn list(pool: &MySqlPool, query: &IncrementQuery) -> AppResult<(Vec<SalaryIncrement>, PageParams, i64)> {
    let page = PageParams::new(query.page, query.per_page, settings::pagination_size(pool).await);

    let mut filters = Filters::new();
    filters.push_opt("employee_id = ?", query.employee_id);
    filters.push_opt("status = ?", query.status.as_deref());
    filters.push_opt("increment_type = ?", query.increment_type.as_deref());
    filters.push_opt("effective_date >= ?", query.effective_date_from);
    filters.push_opt("effective_date <= ?", query.effective_date_to);
    let where_clause = filters.where_clause();

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM salary_increments {}", where_clause))
        .bind_values(filters.values())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, SalaryIncrement>(&format!(
        "{} {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        INCREMENT_SELECT, where_clause
    ))
    .bind_values(filters.values())
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page, total))
}

pub async fn history(pool: &MySqlPool, employee_id: u64) -> AppResult<Vec<SalaryIncrement>> {
    employee::get(pool, employee_id).await?;

    let rows = sqlx::query_as::<_, SalaryIncrement>(&format!(
        "{} WHERE employee_id = ? ORDER BY effective_date DESC, id DESC",
        INCREMENT_SELECT
    ))
    .bind(employee_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn statistics(pool: &MySqlPool, from: Option<NaiveDate>, to: Option<NaiveDate>) -> AppResult<IncrementStatistics> {
    let mut filters = Filters::new();
    filters.push_opt("DATE(created_at) >= ?", from);
    filters.push_opt("DATE(created_at) <= ?", to);
    let where_clause = filters.where_clause();

    let counts = sqlx::query_as::<_, (String, i64)>(&format!(
        "SELECT status, COUNT(*) FROM salary_increments {} GROUP BY status",
        where_clause
    ))
    .bind_values(filters.values())
    .fetch_all(pool)
    .await?;
    let count_of = |status: IncrementStatus| {
        counts
            .iter()
            .find(|(s, _)| s == status.as_ref())
            .map_or(0, |(_, n)| *n)
    };

    filters.push("status = ?", IncrementStatus::Applied.as_ref().into());
    let applied_where = filters.where_clause();

    let (total_amount, avg_percentage) = sqlx::query_as::<_, (f64, f64)>(&format!(
        r#"
        SELECT COALESCE(SUM(new_base_salary + new_food_allowance + new_housing_allowance + new_transport_allowance
                            - current_base_salary - current_food_allowance - current_housing_allowance
                            - current_transport_allowance), 0),
               COALESCE(AVG(increment_percentage), 0)
        FROM salary_increments
        {}
        "#,
        applied_where
    ))
    .bind_values(filters.values())
    .fetch_one(pool)
    .await?;

    let by_type = sqlx::query_as::<_, TypeBreakdown>(&format!(
        r#"
        SELECT increment_type, COUNT(*) AS count, AVG(increment_percentage) AS avg_percentage
        FROM salary_increments
        {}
        GROUP BY increment_type
        ORDER BY increment_type
        "#,
        applied_where
    ))
    .bind_values(filters.values())
    .fetch_all(pool)
    .await?;

    Ok(IncrementStatistics {
        total_increments: counts.iter().map(|(_, n)| n).sum(),
        pending_increments: count_of(IncrementStatus::Pending),
        approved_increments: count_of(IncrementStatus::Approved),
        rejected_increments: count_of(IncrementStatus::Rejected),
        applied_increments: count_of(IncrementStatus::Applied),
        total_increment_amount: round2(total_amount),
        average_increment_percentage: round2(avg_percentage),
        by_type,
    })
}

pub async fn projected_annual_cost(pool: &MySqlPool) -> AppResult<ProjectedCost> {
    let pending = sqlx::query_as::<_, SalaryIncrement>(&format!("{} WHERE status = ?", INCREMENT_SELECT))
        .bind(IncrementStatus::Pending.as_ref())
        .fetch_all(pool)
        .await?;
    Ok(project_annual_cost(&pending))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_review_race_is_a_conflict() {
        assert!(ensure_still_pending(1).is_ok());
        let err = ensure_still_pending(0).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    fn increment(kind: &str, base_now: f64, base_next: f64) -> SalaryIncrement {
        let created = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        SalaryIncrement {
            id: 1,
            employee_id: 1,
            current_base_salary: base_now,
            current_food_allowance: 100.0,
            current_housing_allowance: 0.0,
            current_transport_allowance: 0.0,
            new_base_salary: base_next,
            new_food_allowance: 100.0,
            new_housing_allowance: 0.0,
            new_transport_allowance: 0.0,
            increment_type: kind.to_string(),
            increment_percentage: None,
            increment_amount: None,
            reason: "review".to_string(),
            effective_date: created,
            status: "pending".to_string(),
            requested_by: 1,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejection_reason: None,
            applied_at: None,
            notes: None,
            created_at: created.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn projected_cost_annualizes_monthly_raises() {
        let pending = vec![
            increment("percentage", 5000.0, 5500.0),
            increment("percentage", 4000.0, 4100.0),
            increment("promotion", 6000.0, 7000.0),
        ];

        let projected = project_annual_cost(&pending);
        assert_eq!(projected.total_pending_requests, 3);
        assert_eq!(projected.total_annual_increase, 19_200.0);
        assert_eq!(
            projected.by_type.get("percentage"),
            Some(&TypeCost { count: 2, total_annual_cost: 7_200.0 })
        );
    }

    #[test]
    fn nothing_pending_costs_nothing() {
        assert_eq!(project_annual_cost(&[]), ProjectedCost::default());
    }

    #[test]
    fn create_payload_flattens_terms() {
        let input: CreateIncrement = serde_json::from_value(serde_json::json!({
            "employee_id": 2,
            "increment_type": "percentage",
            "increment_percentage": 7.5,
            "apply_to_allowances": true,
            "reason": "Annual review",
            "effective_date": "2026-07-01"
        }))
        .unwrap();
        assert_eq!(input.terms.increment_percentage, Some(7.5));
        assert!(input.terms.apply_to_allowances);
    }
}
