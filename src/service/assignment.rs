use crate::error::{AppError, AppResult};
use crate::model::assignment::{
    AssignmentSlot, AssignmentStatus, AssignmentType, EmployeeAssignment, plan_normalization,
    timesheet_dates,
};
use crate::model::timesheet::{TimesheetStatus, WorkedHours};
use crate::service::employee;
use crate::utils::db_utils::{ASSIGNMENT_COLUMNS, build_update_sql, execute_update};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{MySql, MySqlPool, Transaction};
use std::collections::HashSet;
use tracing::{debug, info};
use utoipa::ToSchema;

const ASSIGNMENT_SELECT: &str = r#"
    SELECT id, employee_id, assignment_type, name, location, status, start_date, end_date,
           notes, assigned_by, project_id, rental_id, created_at
    FROM employee_assignments
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssignment {
    #[schema(example = "project")]
    pub assignment_type: AssignmentType,
    #[schema(example = "Riyadh Metro Line 3")]
    pub name: String,
    pub location: Option<String>,
    #[schema(example = "2026-03-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-06-30", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub project_id: Option<u64>,
    pub rental_id: Option<u64>,
}

fn check_dates(start: NaiveDate, end: Option<NaiveDate>) -> AppResult<()> {
    if end.is_some_and(|e| e < start) {
        return Err(AppError::bad_request("end_date cannot be before start_date"));
    }
    Ok(())
}

pub async fn get(pool: &MySqlPool, assignment_id: u64) -> AppResult<EmployeeAssignment> {
    sqlx::query_as::<_, EmployeeAssignment>(&format!("{} WHERE id = ?", ASSIGNMENT_SELECT))
        .bind(assignment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Assignment not found"))
}

pub async fn list_for_employee(pool: &MySqlPool, employee_id: u64) -> AppResult<Vec<EmployeeAssignment>> {
    let rows = sqlx::query_as::<_, EmployeeAssignment>(&format!(
        "{} WHERE employee_id = ? ORDER BY start_date DESC, id DESC",
        ASSIGNMENT_SELECT
    ))
    .bind(employee_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Makes the latest assignment the active one and closes all earlier ones.
async fn normalize(tx: &mut Transaction<'_, MySql>, employee_id: u64) -> Result<usize, sqlx::Error> {
    let slots = sqlx::query_as::<_, AssignmentSlot>(
        "SELECT id, start_date, end_date, status FROM employee_assignments WHERE employee_id = ? FOR UPDATE",
    )
    .bind(employee_id)
    .fetch_all(&mut **tx)
    .await?;

    let updates = plan_normalization(&slots);
    for update in &updates {
        debug!(assignment_id = update.id, status = %update.status, "Normalizing assignment");
        sqlx::query("UPDATE employee_assignments SET status = ?, end_date = ? WHERE id = ?")
            .bind(update.status.as_ref())
            .bind(update.end_date)
            .bind(update.id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(updates.len())
}

/// Hours a generated timesheet books for one day of the employee's contract.
fn contract_hours(hours_per_day: u32) -> f64 {
    match hours_per_day {
        0 => 8.0,
        h => f64::from(h),
    }
}

/// Pending timesheets for every day of the assignment up to today that has none yet.
async fn generate_timesheets(
    tx: &mut Transaction<'_, MySql>,
    assignment: &EmployeeAssignment,
    hours_per_day: f64,
    today: NaiveDate,
) -> Result<usize, sqlx::Error> {
    let dates = timesheet_dates(assignment.start_date, assignment.end_date, today);
    let (first, last) = match (dates.first(), dates.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return Ok(0),
    };

    let existing: HashSet<NaiveDate> = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT date FROM timesheets WHERE employee_id = ? AND date BETWEEN ? AND ?",
    )
    .bind(assignment.employee_id)
    .bind(first)
    .bind(last)
    .fetch_all(&mut **tx)
    .await?
    .into_iter()
    .collect();

    let hours = WorkedHours::contract_day(hours_per_day);
    let mut created = 0usize;

    for date in dates.into_iter().filter(|d| !existing.contains(d)) {
        sqlx::query(
            r#"
            INSERT INTO timesheets
                (employee_id, assignment_id, project_id, rental_id, date,
                 regular_hours, overtime_hours, total_hours, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assignment.employee_id)
        .bind(assignment.id)
        .bind(assignment.project_id)
        .bind(assignment.rental_id)
        .bind(date)
        .bind(hours.regular_hours)
        .bind(hours.overtime_hours)
        .bind(hours.total_hours)
        .bind(TimesheetStatus::Pending.as_ref())
        .execute(&mut **tx)
        .await?;
        created += 1;
    }

    Ok(created)
}

pub async fn create(
    pool: &MySqlPool,
    employee_id: u64,
    input: &CreateAssignment,
    assigned_by: u64,
) -> AppResult<EmployeeAssignment> {
    if input.name.trim().is_empty() {
        return Err(AppError::bad_request("Assignment name is required"));
    }
    check_dates(input.start_date, input.end_date)?;

    let employee = employee::get(pool, employee_id).await?;
    let today = Local::now().date_naive();

    let mut tx = pool.begin().await?;

    let assignment_id = sqlx::query(
        r#"
        INSERT INTO employee_assignments
            (employee_id, assignment_type, name, location, status, start_date, end_date,
             notes, assigned_by, project_id, rental_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(input.assignment_type.as_ref())
    .bind(input.name.trim())
    .bind(&input.location)
    .bind(AssignmentStatus::Active.as_ref())
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(&input.notes)
    .bind(assigned_by)
    .bind(input.project_id)
    .bind(input.rental_id)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    let inserted = sqlx::query_as::<_, EmployeeAssignment>(&format!("{} WHERE id = ?", ASSIGNMENT_SELECT))
        .bind(assignment_id)
        .fetch_one(&mut *tx)
        .await?;

    let generated = generate_timesheets(&mut tx, &inserted, contract_hours(employee.contract_hours_per_day), today).await?;
    let normalized = normalize(&mut tx, employee_id).await?;

    tx.commit().await?;

    info!(assignment_id, employee_id, generated, normalized, "Assignment created");
    get(pool, assignment_id).await
}

pub async fn update(pool: &MySqlPool, assignment_id: u64, payload: &Value) -> AppResult<EmployeeAssignment> {
    let current = get(pool, assignment_id).await?;

    if let Some(kind) = payload.get("assignment_type") {
        let valid = kind.as_str().is_some_and(|k| k.parse::<AssignmentType>().is_ok());
        if !valid {
            return Err(AppError::bad_request("Invalid assignment type"));
        }
    }

    let date_field = |field: &str, fallback: Option<NaiveDate>| -> AppResult<Option<NaiveDate>> {
        match payload.get(field) {
            None => Ok(fallback),
            Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(Some)
                .ok_or_else(|| AppError::bad_request(format!("{} must be a YYYY-MM-DD date", field))),
        }
    };
    let start = date_field("start_date", Some(current.start_date))?
        .ok_or_else(|| AppError::bad_request("start_date cannot be null"))?;
    let end = date_field("end_date", current.end_date)?;
    check_dates(start, end)?;

    let update = build_update_sql(&ASSIGNMENT_COLUMNS, payload, "id", assignment_id)?;

    let mut tx = pool.begin().await?;
    execute_update(&mut *tx, update).await?;
    normalize(&mut tx, current.employee_id).await?;
    tx.commit().await?;

    info!(assignment_id, "Assignment updated");
    get(pool, assignment_id).await
}

/// Removes the assignment with the timesheets it would still produce from today on.
pub async fn delete(pool: &MySqlPool, assignment_id: u64) -> AppResult<u64> {
    let assignment = get(pool, assignment_id).await?;
    let today = Local::now().date_naive();

    let kind = assignment.assignment_type.parse::<AssignmentType>().ok();
    let (link_column, link_value) = match (kind, assignment.project_id, assignment.rental_id) {
        (Some(AssignmentType::Project), Some(project_id), _) => ("project_id", project_id),
        (Some(AssignmentType::Rental), _, Some(rental_id)) => ("rental_id", rental_id),
        _ => ("assignment_id", assignment.id),
    };

    let mut tx = pool.begin().await?;

    let removed_timesheets = sqlx::query(&format!(
        "DELETE FROM timesheets WHERE employee_id = ? AND date >= ? AND {} = ?",
        link_column
    ))
    .bind(assignment.employee_id)
    .bind(today)
    .bind(link_value)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    // past timesheets keep their history without the link
    sqlx::query("UPDATE timesheets SET assignment_id = NULL WHERE assignment_id = ?")
        .bind(assignment.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM employee_assignments WHERE id = ?")
        .bind(assignment.id)
        .execute(&mut *tx)
        .await?;

    normalize(&mut tx, assignment.employee_id).await?;
    tx.commit().await?;

    info!(assignment_id, removed_timesheets, "Assignment deleted");
    Ok(removed_timesheets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_before_start_is_rejected() {
        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert!(check_dates(d("2026-03-01"), Some(d("2026-02-28"))).is_err());
        assert!(check_dates(d("2026-03-01"), Some(d("2026-03-01"))).is_ok());
        assert!(check_dates(d("2026-03-01"), None).is_ok());
    }

    #[test]
    fn generated_days_book_the_contract_as_regular_hours() {
        let ten_hour_day = WorkedHours::contract_day(contract_hours(10));
        assert_eq!(ten_hour_day.regular_hours, 10.0);
        assert_eq!(ten_hour_day.overtime_hours, 0.0);

        assert_eq!(contract_hours(0), 8.0);
    }

    #[test]
    fn create_payload_parses_type() {
        let input: CreateAssignment = serde_json::from_value(serde_json::json!({
            "assignment_type": "rental",
            "name": "Crane hire",
            "start_date": "2026-03-01",
            "rental_id": 9
        }))
        .unwrap();
        assert_eq!(input.assignment_type, AssignmentType::Rental);
        assert_eq!(input.end_date, None);
    }
}
