use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::employee::EmployeeStatus;
use crate::model::resignation::{Resignation, ResignationStatus, notice_days};
use crate::model::status::StatusFlow;
use crate::service::{employee, final_settlement};
use crate::utils::db_utils::{BindValues, Filters};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

pub(crate) const RESIGNATION_SELECT: &str = r#"
    SELECT id, employee_id, resignation_date, last_working_day, reason, status, submitted_by,
           reviewed_by, reviewed_at, rejection_reason, created_at
    FROM resignations
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitResignation {
    /// Defaults to the caller's own employee profile
    pub employee_id: Option<u64>,
    #[schema(example = "2026-03-01", format = "date", value_type = String)]
    pub resignation_date: NaiveDate,
    #[schema(example = "2026-03-31", format = "date", value_type = String)]
    pub last_working_day: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ResignationQuery {
    pub employee_id: Option<u64>,
    pub status: Option<String>,
}

pub async fn get(pool: &MySqlPool, resignation_id: u64) -> AppResult<Resignation> {
    sqlx::query_as::<_, Resignation>(&format!("{} WHERE id = ?", RESIGNATION_SELECT))
        .bind(resignation_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Resignation not found"))
}

pub async fn submit(pool: &MySqlPool, user: &AuthUser, input: &SubmitResignation) -> AppResult<Resignation> {
    let employee_id = match input.employee_id {
        Some(id) => {
            user.require_self_or_hr(id)?;
            id
        }
        None => user.own_employee_id()?,
    };

    if input.reason.trim().is_empty() {
        return Err(AppError::bad_request("A reason is required"));
    }
    if notice_days(input.resignation_date, input.last_working_day) < 0 {
        return Err(AppError::bad_request("last_working_day cannot be before resignation_date"));
    }

    employee::get(pool, employee_id).await?;

    let open = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM resignations WHERE employee_id = ? AND status IN (?, ?)",
    )
    .bind(employee_id)
    .bind(ResignationStatus::Pending.as_ref())
    .bind(ResignationStatus::Approved.as_ref())
    .fetch_one(pool)
    .await?;
    if open > 0 {
        return Err(AppError::conflict("Employee already has an open resignation"));
    }

    let resignation_id = sqlx::query(
        r#"
        INSERT INTO resignations
            (employee_id, resignation_date, last_working_day, reason, status, submitted_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(input.resignation_date)
    .bind(input.last_working_day)
    .bind(input.reason.trim())
    .bind(ResignationStatus::Pending.as_ref())
    .bind(user.user_id)
    .execute(pool)
    .await?
    .last_insert_id();

    info!(resignation_id, employee_id, "Resignation submitted");
    get(pool, resignation_id).await
}

/// Approval also moves the employee to `resigned` and calculates their final settlement.
pub async fn approve(pool: &MySqlPool, resignation_id: u64, reviewer: u64) -> AppResult<Resignation> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Resignation>(&format!("{} WHERE id = ? FOR UPDATE", RESIGNATION_SELECT))
        .bind(resignation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Resignation not found"))?;
    ResignationStatus::ensure_transition(&current.status, ResignationStatus::Approved)?;

    sqlx::query("UPDATE resignations SET status = ?, reviewed_by = ?, reviewed_at = NOW() WHERE id = ?")
        .bind(ResignationStatus::Approved.as_ref())
        .bind(reviewer)
        .bind(resignation_id)
        .execute(&mut *tx)
        .await?;

    employee::set_status(&mut tx, current.employee_id, EmployeeStatus::Resigned).await?;
    let settlement_id = final_settlement::create_for_resignation(&mut tx, &current).await?;
    tx.commit().await?;

    info!(resignation_id, employee_id = current.employee_id, reviewer, settlement_id, "Resignation approved");
    get(pool, resignation_id).await
}

/// A status-guarded update that touched nothing lost a race with another reviewer.
fn ensure_still_pending(affected: u64) -> AppResult<()> {
    if affected == 0 {
        return Err(AppError::conflict("Resignation is no longer pending"));
    }
    Ok(())
}

pub async fn reject(pool: &MySqlPool, resignation_id: u64, reviewer: u64, reason: &str) -> AppResult<Resignation> {
    if reason.trim().is_empty() {
        return Err(AppError::bad_request("A rejection reason is required"));
    }

    let current = get(pool, resignation_id).await?;
    ResignationStatus::ensure_transition(&current.status, ResignationStatus::Rejected)?;

    let affected = sqlx::query(
        r#"
        UPDATE resignations
        SET status = ?, reviewed_by = ?, reviewed_at = NOW(), rejection_reason = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(ResignationStatus::Rejected.as_ref())
    .bind(reviewer)
    .bind(reason.trim())
    .bind(resignation_id)
    .bind(ResignationStatus::Pending.as_ref())
    .execute(pool)
    .await?
    .rows_affected();
    ensure_still_pending(affected)?;

    info!(resignation_id, reviewer, "Resignation rejected");
    get(pool, resignation_id).await
}

/// Only the employee who resigned may take it back, and only while pending.
pub async fn withdraw(pool: &MySqlPool, user: &AuthUser, resignation_id: u64) -> AppResult<Resignation> {
    let current = get(pool, resignation_id).await?;
    if user.employee_id != Some(current.employee_id) {
        return Err(AppError::forbidden("Only the resigning employee can withdraw"));
    }
    ResignationStatus::ensure_transition(&current.status, ResignationStatus::Withdrawn)?;

    let affected = sqlx::query("UPDATE resignations SET status = ? WHERE id = ? AND status = ?")
        .bind(ResignationStatus::Withdrawn.as_ref())
        .bind(resignation_id)
        .bind(ResignationStatus::Pending.as_ref())
        .execute(pool)
        .await?
        .rows_affected();
    ensure_still_pending(affected)?;

    info!(resignation_id, "Resignation withdrawn");
    get(pool, resignation_id).await
}

pub async fn list(pool: &MySqlPool, user: &AuthUser, query: &ResignationQuery) -> AppResult<Vec<Resignation>> {
    let employee_id = if user.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(user.own_employee_id()?)
    };

    let mut filters = Filters::new();
    filters.push_opt("employee_id = ?", employee_id);
    filters.push_opt("status = ?", query.status.as_deref());

    let rows = sqlx::query_as::<_, Resignation>(&format!(
        "{} {} ORDER BY created_at DESC, id DESC",
        RESIGNATION_SELECT,
        filters.where_clause()
    ))
    .bind_values(filters.values())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_payload_without_employee_targets_self() {
        let input: SubmitResignation = serde_json::from_value(serde_json::json!({
            "resignation_date": "2026-03-01",
            "last_working_day": "2026-03-31",
            "reason": "Relocating"
        }))
        .unwrap();
        assert_eq!(input.employee_id, None);
        assert_eq!(notice_days(input.resignation_date, input.last_working_day), 30);
    }

    #[test]
    fn lost_review_race_is_a_conflict() {
        assert!(matches!(ensure_still_pending(0), Err(AppError::Conflict(_))));
        assert!(ensure_still_pending(1).is_ok());
    }
}
