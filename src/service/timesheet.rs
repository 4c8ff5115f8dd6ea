use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::status::StatusFlow;
use crate::model::timesheet::{Timesheet, TimesheetStatus, WorkedHours};
use crate::service::{employee, settings};
use crate::utils::db_utils::{BindValues, Filters, PageParams};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

const TIMESHEET_SELECT: &str = r#"
    SELECT id, employee_id, assignment_id, project_id, rental_id, date, clock_in, clock_out,
           break_minutes, regular_hours, overtime_hours, total_hours, status, approved_by,
           rejection_reason, created_at
    FROM timesheets
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTimesheet {
    pub employee_id: u64,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "07:00:00", value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(example = "17:30:00", value_type = String)]
    pub clock_out: NaiveTime,
    #[serde(default)]
    pub break_minutes: u32,
    pub assignment_id: Option<u64>,
    pub project_id: Option<u64>,
    pub rental_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TimesheetQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub status: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RangeQuery {
    #[param(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[param(value_type = String, format = "date")]
    pub to: NaiveDate,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct TimesheetTotals {
    pub days: i64,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub total_hours: f64,
}

pub async fn get(pool: &MySqlPool, timesheet_id: u64) -> AppResult<Timesheet> {
    sqlx::query_as::<_, Timesheet>(&format!("{} WHERE id = ?", TIMESHEET_SELECT))
        .bind(timesheet_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Timesheet not found"))
}

pub async fn create(pool: &MySqlPool, input: &CreateTimesheet, regular_limit: f64) -> AppResult<Timesheet> {
    employee::get(pool, input.employee_id).await?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM timesheets WHERE employee_id = ? AND date = ?",
    )
    .bind(input.employee_id)
    .bind(input.date)
    .fetch_one(pool)
    .await?;
    if existing > 0 {
        return Err(AppError::conflict("A timesheet already exists for this date"));
    }

    let hours = WorkedHours::from_clock(input.clock_in, input.clock_out, input.break_minutes, regular_limit);
    debug!(employee_id = input.employee_id, total = hours.total_hours, "Recording timesheet");

    let timesheet_id = sqlx::query(
        r#"
        INSERT INTO timesheets
            (employee_id, assignment_id, project_id, rental_id, date, clock_in, clock_out,
             break_minutes, regular_hours, overtime_hours, total_hours, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.employee_id)
    .bind(input.assignment_id)
    .bind(input.project_id)
    .bind(input.rental_id)
    .bind(input.date)
    .bind(input.clock_in)
    .bind(input.clock_out)
    .bind(input.break_minutes)
    .bind(hours.regular_hours)
    .bind(hours.overtime_hours)
    .bind(hours.total_hours)
    .bind(TimesheetStatus::Pending.as_ref())
    .execute(pool)
    .await?
    .last_insert_id();

    info!(timesheet_id, employee_id = input.employee_id, "Timesheet created");
    get(pool, timesheet_id).await
}

async fn review(
    pool: &MySqlPool,
    timesheet_id: u64,
    next: TimesheetStatus,
    reviewer: u64,
    reason: Option<&str>,
) -> AppResult<Timesheet> {
    let current = get(pool, timesheet_id).await?;
    TimesheetStatus::ensure_transition(&current.status, next)?;

    // status guard in the WHERE keeps a concurrent review from being overwritten
    let affected = sqlx::query(
        "UPDATE timesheets SET status = ?, approved_by = ?, rejection_reason = ? WHERE id = ? AND status = ?",
    )
    .bind(next.as_ref())
    .bind(reviewer)
    .bind(reason)
    .bind(timesheet_id)
    .bind(TimesheetStatus::Pending.as_ref())
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::conflict("Timesheet was reviewed by someone else"));
    }

    info!(timesheet_id, status = %next, reviewer, "Timesheet reviewed");
    get(pool, timesheet_id).await
}

pub async fn approve(pool: &MySqlPool, timesheet_id: u64, reviewer: u64) -> AppResult<Timesheet> {
    review(pool, timesheet_id, TimesheetStatus::Approved, reviewer, None).await
}

pub async fn reject(pool: &MySqlPool, timesheet_id: u64, reviewer: u64, reason: &str) -> AppResult<Timesheet> {
    if reason.trim().is_empty() {
        return Err(AppError::bad_request("A rejection reason is required"));
    }
    review(pool, timesheet_id, TimesheetStatus::Rejected, reviewer, Some(reason.trim())).await
}

/// Approves every listed timesheet or none of them.
pub async fn bulk_approve(pool: &MySqlPool, ids: &[u64], reviewer: u64) -> AppResult<usize> {
    if ids.is_empty() {
        return Err(AppError::bad_request("No timesheets given"));
    }

    let mut tx = pool.begin().await?;

    for id in ids {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM timesheets WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let status = match status {
            Some(s) => s,
            None => {
                warn!(timesheet_id = id, "Bulk approval aborted, timesheet missing");
                return Err(AppError::not_found(format!("Timesheet {} not found", id)));
            }
        };
        TimesheetStatus::ensure_transition(&status, TimesheetStatus::Approved)?;

        sqlx::query("UPDATE timesheets SET status = ?, approved_by = ? WHERE id = ?")
            .bind(TimesheetStatus::Approved.as_ref())
            .bind(reviewer)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!(count = ids.len(), reviewer, "Timesheets approved in bulk");
    Ok(ids.len())
}

pub async fn list(
    pool: &MySqlPool,
    user: &AuthUser,
    query: &TimesheetQuery,
) -> AppResult<(Vec<Timesheet>, PageParams, i64)> {
    let page = PageParams::new(query.page, query.per_page, settings::pagination_size(pool).await);

    // employees only ever see their own sheets
    let employee_id = if user.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(user.own_employee_id()?)
    };

    let mut filters = Filters::new();
    filters.push_opt("employee_id = ?", employee_id);
    filters.push_opt("status = ?", query.status.as_deref());
    filters.push_opt("date >= ?", query.from);
    filters.push_opt("date <= ?", query.to);
    let where_clause = filters.where_clause();

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM timesheets {}", where_clause))
        .bind_values(filters.values())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, Timesheet>(&format!(
        "{} {} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
        TIMESHEET_SELECT, where_clause
    ))
    .bind_values(filters.values())
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page, total))
}

/// Hours of approved timesheets in `[from, to]`.
pub async fn totals(pool: &MySqlPool, employee_id: u64, from: NaiveDate, to: NaiveDate) -> AppResult<TimesheetTotals> {
    if to < from {
        return Err(AppError::bad_request("'to' cannot be before 'from'"));
    }

    let totals = sqlx::query_as::<_, TimesheetTotals>(
        r#"
        SELECT COUNT(*) AS days,
               COALESCE(SUM(regular_hours), 0) AS regular_hours,
               COALESCE(SUM(overtime_hours), 0) AS overtime_hours,
               COALESCE(SUM(total_hours), 0) AS total_hours
        FROM timesheets
        WHERE employee_id = ? AND date BETWEEN ? AND ? AND status = ?
        "#,
    )
    .bind(employee_id)
    .bind(from)
    .bind(to)
    .bind(TimesheetStatus::Approved.as_ref())
    .fetch_one(pool)
    .await?;

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_payload_parses_clock_times() {
        let input: CreateTimesheet = serde_json::from_value(serde_json::json!({
            "employee_id": 4,
            "date": "2026-03-02",
            "clock_in": "07:00:00",
            "clock_out": "17:30:00",
            "break_minutes": 30
        }))
        .unwrap();

        let hours = WorkedHours::from_clock(input.clock_in, input.clock_out, input.break_minutes, 8.0);
        assert_eq!(hours.total_hours, 10.0);
        assert_eq!(hours.overtime_hours, 2.0);
        assert_eq!(input.assignment_id, None);
    }

    #[test]
    fn break_defaults_to_zero() {
        let input: CreateTimesheet = serde_json::from_value(serde_json::json!({
            "employee_id": 4,
            "date": "2026-03-02",
            "clock_in": "08:00:00",
            "clock_out": "12:00:00"
        }))
        .unwrap();
        assert_eq!(input.break_minutes, 0);
    }
}
