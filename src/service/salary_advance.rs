use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::employee::round2;
use crate::model::salary_advance::{AdvanceStatus, SalaryAdvance, check_eligibility};
use crate::model::status::StatusFlow;
use crate::service::{employee, settings};
use crate::utils::db_utils::{
    BindValues, Filters, PageParams, SALARY_ADVANCE_COLUMNS, build_update_sql, execute_update,
};
use chrono::{Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

pub const ADVANCE_SELECT: &str = r#"
    SELECT id, employee_id, amount, approved_amount, reason, installments, repayment_method,
           status, requested_date, approved_by, approved_at, rejected_by, rejection_reason,
           paid_at, payment_method, payment_reference, next_deduction_date, remaining_balance,
           notes, created_at
    FROM salary_advances
"#;

fn default_installments() -> u32 {
    1
}

fn default_repayment_method() -> String {
    "monthly_deduction".to_string()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAdvance {
    /// Defaults to the caller's own employee profile
    pub employee_id: Option<u64>,
    #[schema(example = 1500.0)]
    pub amount: f64,
    pub reason: Option<String>,
    #[serde(default = "default_installments")]
    #[schema(example = 3)]
    pub installments: u32,
    #[serde(default = "default_repayment_method")]
    pub repayment_method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApproveAdvance {
    /// Defaults to the requested amount
    pub approved_amount: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayAdvance {
    #[schema(example = "bank_transfer")]
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AdvanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub status: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub date_from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct AdvanceStatistics {
    pub total_requests: i64,
    pub pending_requests: i64,
    pub approved_requests: i64,
    pub rejected_requests: i64,
    pub paid_requests: i64,
    pub total_amount_requested: f64,
    pub total_amount_approved: f64,
    pub total_amount_paid: f64,
    pub average_advance_amount: f64,
    /// Share of requests approved or paid, in percent
    #[sqlx(skip)]
    pub approval_rate: f64,
}

pub async fn get(pool: &MySqlPool, advance_id: u64) -> AppResult<SalaryAdvance> {
    sqlx::query_as::<_, SalaryAdvance>(&format!("{} WHERE id = ?", ADVANCE_SELECT))
        .bind(advance_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Salary advance not found"))
}

/// Sum of pending and approved advances, i.e. money promised but not yet paid out.
async fn outstanding(pool: &MySqlPool, employee_id: u64, exclude: Option<u64>) -> AppResult<f64> {
    let total = sqlx::query_scalar::<_, f64>(
        r#"
        SELECT COALESCE(SUM(COALESCE(approved_amount, amount)), 0)
        FROM salary_advances
        WHERE employee_id = ? AND status IN (?, ?) AND id <> ?
        "#,
    )
    .bind(employee_id)
    .bind(AdvanceStatus::Pending.as_ref())
    .bind(AdvanceStatus::Approved.as_ref())
    .bind(exclude.unwrap_or(0))
    .fetch_one(pool)
    .await?;
    Ok(total)
}

async fn ensure_eligible(
    pool: &MySqlPool,
    employee_id: u64,
    amount: f64,
    ratio: f64,
    exclude: Option<u64>,
) -> AppResult<()> {
    let employee = employee::get(pool, employee_id).await?;
    if !employee.advance_salary_eligible {
        return Err(AppError::unprocessable("Employee is not eligible for salary advances"));
    }

    let outstanding = outstanding(pool, employee_id, exclude).await?;
    check_eligibility(employee.basic_salary, ratio, outstanding, amount)
}

pub async fn create(pool: &MySqlPool, user: &AuthUser, input: &CreateAdvance, ratio: f64) -> AppResult<SalaryAdvance> {
    let employee_id = match input.employee_id {
        Some(id) => {
            user.require_self_or_hr(id)?;
            id
        }
        None => user.own_employee_id()?,
    };

    if input.installments == 0 {
        return Err(AppError::bad_request("installments must be at least 1"));
    }
    ensure_eligible(pool, employee_id, input.amount, ratio, None).await?;

    let advance_id = sqlx::query(
        r#"
        INSERT INTO salary_advances
            (employee_id, amount, reason, installments, repayment_method, status,
             requested_date, remaining_balance, notes)
        VALUES (?, ?, ?, ?, ?, ?, CURDATE(), ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(round2(input.amount))
    .bind(&input.reason)
    .bind(input.installments)
    .bind(&input.repayment_method)
    .bind(AdvanceStatus::Pending.as_ref())
    .bind(round2(input.amount))
    .bind(&input.notes)
    .execute(pool)
    .await?
    .last_insert_id();

    info!(advance_id, employee_id, amount = input.amount, "Salary advance requested");
    get(pool, advance_id).await
}

pub async fn update(pool: &MySqlPool, advance_id: u64, payload: &Value, ratio: f64) -> AppResult<SalaryAdvance> {
    let current = get(pool, advance_id).await?;
    if current.status != AdvanceStatus::Pending.as_ref() {
        return Err(AppError::unprocessable("Only pending advances can be updated"));
    }

    if let Some(installments) = payload.get("installments") {
        if installments.as_u64().is_none_or(|n| n == 0) {
            return Err(AppError::bad_request("installments must be at least 1"));
        }
    }
    if let Some(amount) = payload.get("amount") {
        let amount = amount
            .as_f64()
            .ok_or_else(|| AppError::bad_request("amount must be a number"))?;
        ensure_eligible(pool, current.employee_id, amount, ratio, Some(advance_id)).await?;
    }

    let update = build_update_sql(&SALARY_ADVANCE_COLUMNS, payload, "id", advance_id)?;
    execute_update(pool, update).await?;

    // pending advances owe exactly what they ask for
    sqlx::query("UPDATE salary_advances SET remaining_balance = amount WHERE id = ?")
        .bind(advance_id)
        .execute(pool)
        .await?;

    info!(advance_id, "Salary advance updated");
    get(pool, advance_id).await
}

pub async fn approve(
    pool: &MySqlPool,
    advance_id: u64,
    approver: u64,
    input: &ApproveAdvance,
) -> AppResult<SalaryAdvance> {
    let current = get(pool, advance_id).await?;
    AdvanceStatus::ensure_transition(&current.status, AdvanceStatus::Approved)?;

    let approved_amount = match input.approved_amount {
        Some(a) if a <= 0.0 => return Err(AppError::bad_request("approved_amount must be positive")),
        Some(a) if a > current.amount => {
            return Err(AppError::unprocessable("approved_amount cannot exceed the requested amount"));
        }
        Some(a) => round2(a),
        None => current.amount,
    };

    let affected = sqlx::query(
        r#"
        UPDATE salary_advances
        SET status = ?, approved_amount = ?, remaining_balance = ?, approved_by = ?, approved_at = NOW()
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(AdvanceStatus::Approved.as_ref())
    .bind(approved_amount)
    .bind(approved_amount)
    .bind(approver)
    .bind(advance_id)
    .bind(AdvanceStatus::Pending.as_ref())
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::conflict("Salary advance was changed concurrently"));
    }

    info!(advance_id, approver, approved_amount, "Salary advance approved");
    get(pool, advance_id).await
}

pub async fn reject(pool: &MySqlPool, advance_id: u64, rejector: u64, reason: &str) -> AppResult<SalaryAdvance> {
    if reason.trim().is_empty() {
        return Err(AppError::bad_request("A rejection reason is required"));
    }

    let current = get(pool, advance_id).await?;
    AdvanceStatus::ensure_transition(&current.status, AdvanceStatus::Rejected)?;

    sqlx::query(
        "UPDATE salary_advances SET status = ?, rejected_by = ?, rejection_reason = ? WHERE id = ? AND status = ?",
    )
    .bind(AdvanceStatus::Rejected.as_ref())
    .bind(rejector)
    .bind(reason.trim())
    .bind(advance_id)
    .bind(&current.status)
    .execute(pool)
    .await?;

    info!(advance_id, rejector, "Salary advance rejected");
    get(pool, advance_id).await
}

/// Pays out an approved advance; repayment starts with next month's payroll.
pub async fn pay(pool: &MySqlPool, advance_id: u64, input: &PayAdvance) -> AppResult<SalaryAdvance> {
    let current = get(pool, advance_id).await?;
    AdvanceStatus::ensure_transition(&current.status, AdvanceStatus::Paid)?;

    let today = Local::now().date_naive();
    let next_deduction = today
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::internal("next deduction date out of range"))?;
    let principal = current.approved_amount.unwrap_or(current.amount);

    sqlx::query(
        r#"
        UPDATE salary_advances
        SET status = ?, paid_at = NOW(), payment_method = ?, payment_reference = ?,
            next_deduction_date = ?, remaining_balance = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(AdvanceStatus::Paid.as_ref())
    .bind(input.payment_method.as_deref().unwrap_or("bank_transfer"))
    .bind(&input.payment_reference)
    .bind(next_deduction)
    .bind(principal)
    .bind(advance_id)
    .bind(AdvanceStatus::Approved.as_ref())
    .execute(pool)
    .await?;

    info!(advance_id, amount = principal, "Salary advance paid");
    get(pool, advance_id).await
}

pub async fn list(
    pool: &MySqlPool,
    user: &AuthUser,
    query: &AdvanceQuery,
) -> AppResult<(Vec<SalaryAdvance>, PageParams, i64)> {
    let page = PageParams::new(query.page, query.per_page, settings::pagination_size(pool).await);

    let employee_id = if user.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(user.own_employee_id()?)
    };

    let mut filters = Filters::new();
    filters.push_opt("employee_id = ?", employee_id);
    filters.push_opt("status = ?", query.status.as_deref());
    filters.push_opt("requested_date >= ?", query.date_from);
    filters.push_opt("requested_date <= ?", query.date_to);
    let where_clause = filters.where_clause();

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM salary_advances {}", where_clause))
        .bind_values(filters.values())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, SalaryAdvance>(&format!(
        "{} {} ORDER BY requested_date DESC, id DESC LIMIT ? OFFSET ?",
        ADVANCE_SELECT, where_clause
    ))
    .bind_values(filters.values())
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page, total))
}

pub fn approval_rate(total: i64, approved_or_paid: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(approved_or_paid as f64 / total as f64 * 100.0)
}

pub async fn statistics(pool: &MySqlPool, from: Option<NaiveDate>, to: Option<NaiveDate>) -> AppResult<AdvanceStatistics> {
    let mut filters = Filters::new();
    filters.push_opt("requested_date >= ?", from);
    filters.push_opt("requested_date <= ?", to);

    let sql = format!(
        r#"
        SELECT COUNT(*) AS total_requests,
               CAST(COALESCE(SUM(status = 'pending'), 0) AS SIGNED) AS pending_requests,
               CAST(COALESCE(SUM(status = 'approved'), 0) AS SIGNED) AS approved_requests,
               CAST(COALESCE(SUM(status = 'rejected'), 0) AS SIGNED) AS rejected_requests,
               CAST(COALESCE(SUM(status IN ('paid', 'repaid')), 0) AS SIGNED) AS paid_requests,
               COALESCE(SUM(amount), 0) AS total_amount_requested,
               COALESCE(SUM(CASE WHEN status <> 'rejected' THEN approved_amount END), 0) AS total_amount_approved,
               COALESCE(SUM(CASE WHEN status IN ('paid', 'repaid') THEN approved_amount END), 0) AS total_amount_paid,
               COALESCE(AVG(amount), 0) AS average_advance_amount
        FROM salary_advances
        {}
        "#,
        filters.where_clause()
    );

    let mut stats = sqlx::query_as::<_, AdvanceStatistics>(&sql)
        .bind_values(filters.values())
        .fetch_one(pool)
        .await?;

    stats.approval_rate = approval_rate(
        stats.total_requests,
        stats.approved_requests + stats.paid_requests,
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_payload_defaults_to_one_installment() {
        let input: CreateAdvance = serde_json::from_value(serde_json::json!({ "amount": 900.0 })).unwrap();
        assert_eq!(input.installments, 1);
        assert_eq!(input.repayment_method, "monthly_deduction");
        assert_eq!(input.employee_id, None);
    }

    #[test]
    fn approval_rate_is_a_percentage() {
        assert_eq!(approval_rate(0, 0), 0.0);
        assert_eq!(approval_rate(3, 2), 66.67);
        assert_eq!(approval_rate(4, 4), 100.0);
    }
}
