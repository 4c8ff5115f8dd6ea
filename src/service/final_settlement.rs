use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::final_settlement::{
    FinalSettlement, SettlementAmounts, SettlementFacts, SettlementStatus, calculate_settlement,
    leave_taken_in_final_year,
};
use crate::model::leave_request::{LeaveStatus, LeaveType};
use crate::model::payroll::month_bounds;
use crate::model::resignation::{Resignation, ResignationStatus};
use crate::model::salary_advance::AdvanceStatus;
use crate::model::status::StatusFlow;
use crate::service::resignation::RESIGNATION_SELECT;
use crate::utils::db_utils::{BindValues, Filters, PageParams};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const SETTLEMENT_SELECT: &str = r#"
    SELECT id, employee_id, resignation_id, last_working_day, service_years, basic_salary, unpaid_salary,
           allowances, leave_encashment, gratuity_amount, bonus_amount, advance_deduction, other_deductions,
           gross_amount, total_deductions, net_amount, status, approved_by, approved_at, paid_at,
           payment_method, payment_reference, cancellation_reason, notes, created_at
    FROM final_settlements
"#;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SettlementQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSettlement {
    /// An approved resignation without an open settlement
    pub resignation_id: u64,
}

/// Parts HR may correct while the settlement is pending; the rest is calculated.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdjustSettlement {
    #[schema(example = 1200.0)]
    pub leave_encashment: Option<f64>,
    pub bonus_amount: Option<f64>,
    pub other_deductions: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PaySettlement {
    /// Defaults to `bank_transfer`
    #[schema(example = "bank_transfer")]
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
}

impl AdjustSettlement {
    fn apply(&self, mut amounts: SettlementAmounts) -> AppResult<SettlementAmounts> {
        if let Some(v) = self.leave_encashment {
            amounts.leave_encashment = v;
        }
        if let Some(v) = self.bonus_amount {
            amounts.bonus_amount = v;
        }
        if let Some(v) = self.other_deductions {
            amounts.other_deductions = v;
        }
        if amounts.has_negative_part() {
            return Err(AppError::bad_request("Settlement amounts cannot be negative"));
        }
        Ok(amounts)
    }
}

pub async fn get(pool: &MySqlPool, settlement_id: u64) -> AppResult<FinalSettlement> {
    sqlx::query_as::<_, FinalSettlement>(&format!("{} WHERE id = ?", SETTLEMENT_SELECT))
        .bind(settlement_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Final settlement not found"))
}

async fn lock(tx: &mut Transaction<'_, MySql>, settlement_id: u64) -> AppResult<FinalSettlement> {
    sqlx::query_as::<_, FinalSettlement>(&format!("{} WHERE id = ? FOR UPDATE", SETTLEMENT_SELECT))
        .bind(settlement_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Final settlement not found"))
}

#[derive(sqlx::FromRow)]
struct LeavingEmployee {
    basic_salary: f64,
    food_allowance: f64,
    housing_allowance: f64,
    transport_allowance: f64,
    hire_date: NaiveDate,
}

/// Gathers what the employee is owed as of `last_working_day`.
async fn settlement_facts(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
    last_working_day: NaiveDate,
) -> AppResult<SettlementFacts> {
    let employee = sqlx::query_as::<_, LeavingEmployee>(
        r#"
        SELECT basic_salary, food_allowance, housing_allowance, transport_allowance, hire_date
        FROM employees
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(employee_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::not_found("Employee not found"))?;

    let (month, _) = month_bounds(last_working_day).ok_or_else(|| AppError::bad_request("Invalid last working day"))?;
    let payrolls_for_month = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payroll WHERE employee_id = ? AND month = ?")
        .bind(employee_id)
        .bind(month)
        .fetch_one(&mut **tx)
        .await?;

    let leaves: Vec<(NaiveDate, NaiveDate)> = sqlx::query_as(
        r#"
        SELECT start_date, end_date
        FROM leave_requests
        WHERE employee_id = ? AND leave_type = ? AND status = ? AND end_date >= MAKEDATE(YEAR(?), 1)
        "#,
    )
    .bind(employee_id)
    .bind(LeaveType::Annual.as_ref())
    .bind(LeaveStatus::Approved.as_ref())
    .bind(last_working_day)
    .fetch_all(&mut **tx)
    .await?;

    let outstanding_advances = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(remaining_balance), 0) FROM salary_advances WHERE employee_id = ? AND status = ?",
    )
    .bind(employee_id)
    .bind(AdvanceStatus::Paid.as_ref())
    .fetch_one(&mut **tx)
    .await?;

    Ok(SettlementFacts {
        basic_salary: employee.basic_salary,
        monthly_allowances: employee.food_allowance + employee.housing_allowance + employee.transport_allowance,
        hire_date: employee.hire_date,
        last_working_day,
        final_month_unpaid: payrolls_for_month == 0,
        annual_leave_taken: leave_taken_in_final_year(&leaves, last_working_day),
        outstanding_advances,
    })
}

/// Calculates and stores the settlement of a resignation inside the caller's transaction.
///
/// An employee has at most one settlement that is not cancelled.
pub async fn create_for_resignation(tx: &mut Transaction<'_, MySql>, resignation: &Resignation) -> AppResult<u64> {
    let open = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM final_settlements WHERE employee_id = ? AND status <> ? FOR UPDATE",
    )
    .bind(resignation.employee_id)
    .bind(SettlementStatus::Cancelled.as_ref())
    .fetch_one(&mut **tx)
    .await?;
    if open > 0 {
        return Err(AppError::conflict("Employee already has an open final settlement"));
    }

    let facts = settlement_facts(tx, resignation.employee_id, resignation.last_working_day).await?;
    let (service_years, amounts) = calculate_settlement(&facts);

    let settlement_id = sqlx::query(
        r#"
        INSERT INTO final_settlements
            (employee_id, resignation_id, last_working_day, service_years, basic_salary, unpaid_salary,
             allowances, leave_encashment, gratuity_amount, bonus_amount, advance_deduction, other_deductions,
             gross_amount, total_deductions, net_amount, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(resignation.employee_id)
    .bind(resignation.id)
    .bind(resignation.last_working_day)
    .bind(service_years)
    .bind(facts.basic_salary)
    .bind(amounts.unpaid_salary)
    .bind(amounts.allowances)
    .bind(amounts.leave_encashment)
    .bind(amounts.gratuity_amount)
    .bind(amounts.bonus_amount)
    .bind(amounts.advance_deduction)
    .bind(amounts.other_deductions)
    .bind(amounts.gross())
    .bind(amounts.deductions())
    .bind(amounts.net())
    .bind(SettlementStatus::Pending.as_ref())
    .execute(&mut **tx)
    .await?
    .last_insert_id();

    if amounts.net() < 0.0 {
        warn!(settlement_id, net = amounts.net(), "Final settlement leaves the employee owing money");
    }
    info!(
        settlement_id,
        employee_id = resignation.employee_id,
        net = amounts.net(),
        "Final settlement calculated"
    );
    Ok(settlement_id)
}

/// Recalculates a settlement for an approved resignation, e.g. after the first one was cancelled.
pub async fn create(pool: &MySqlPool, input: &CreateSettlement) -> AppResult<FinalSettlement> {
    let mut tx = pool.begin().await?;

    let resignation = sqlx::query_as::<_, Resignation>(&format!("{} WHERE id = ? FOR UPDATE", RESIGNATION_SELECT))
        .bind(input.resignation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Resignation not found"))?;

    if ResignationStatus::parse_stored(&resignation.status)? != ResignationStatus::Approved {
        return Err(AppError::unprocessable("Only approved resignations are settled"));
    }

    let settlement_id = create_for_resignation(&mut tx, &resignation).await?;
    tx.commit().await?;
    get(pool, settlement_id).await
}

pub async fn list(
    pool: &MySqlPool,
    user: &AuthUser,
    query: &SettlementQuery,
    per_page_default: u32,
) -> AppResult<(Vec<FinalSettlement>, PageParams, i64)> {
    let employee_id = if user.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(user.own_employee_id()?)
    };
    let page = PageParams::new(query.page, query.per_page, per_page_default);

    let mut filters = Filters::new();
    filters.push_opt("employee_id = ?", employee_id);
    filters.push_opt("status = ?", query.status.as_deref());
    let where_clause = filters.where_clause();

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM final_settlements {}", where_clause))
        .bind_values(filters.values())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, FinalSettlement>(&format!(
        "{} {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        SETTLEMENT_SELECT, where_clause
    ))
    .bind_values(filters.values())
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page, total))
}

pub async fn adjust(pool: &MySqlPool, settlement_id: u64, input: &AdjustSettlement) -> AppResult<FinalSettlement> {
    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, settlement_id).await?;
    if SettlementStatus::parse_stored(&current.status)? != SettlementStatus::Pending {
        return Err(AppError::unprocessable("Only pending settlements can be adjusted"));
    }

    let amounts = input.apply(current.amounts())?;
    sqlx::query(
        r#"
        UPDATE final_settlements
        SET leave_encashment = ?, bonus_amount = ?, other_deductions = ?,
            gross_amount = ?, total_deductions = ?, net_amount = ?, notes = COALESCE(?, notes)
        WHERE id = ?
        "#,
    )
    .bind(amounts.leave_encashment)
    .bind(amounts.bonus_amount)
    .bind(amounts.other_deductions)
    .bind(amounts.gross())
    .bind(amounts.deductions())
    .bind(amounts.net())
    .bind(input.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()))
    .bind(settlement_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(settlement_id, net = amounts.net(), "Final settlement adjusted");
    get(pool, settlement_id).await
}

pub async fn approve(pool: &MySqlPool, settlement_id: u64, approver: u64) -> AppResult<FinalSettlement> {
    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, settlement_id).await?;
    SettlementStatus::ensure_transition(&current.status, SettlementStatus::Approved)?;

    sqlx::query("UPDATE final_settlements SET status = ?, approved_by = ?, approved_at = NOW() WHERE id = ?")
        .bind(SettlementStatus::Approved.as_ref())
        .bind(approver)
        .bind(settlement_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(settlement_id, approver, "Final settlement approved");
    get(pool, settlement_id).await
}

/// Paying out also closes the employee's outstanding advances, which the settlement recovered.
pub async fn mark_paid(pool: &MySqlPool, settlement_id: u64, input: &PaySettlement) -> AppResult<FinalSettlement> {
    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, settlement_id).await?;
    SettlementStatus::ensure_transition(&current.status, SettlementStatus::Paid)?;

    sqlx::query(
        "UPDATE final_settlements SET status = ?, paid_at = NOW(), payment_method = ?, payment_reference = ? WHERE id = ?",
    )
    .bind(SettlementStatus::Paid.as_ref())
    .bind(input.payment_method.as_deref().unwrap_or("bank_transfer"))
    .bind(&input.payment_reference)
    .bind(settlement_id)
    .execute(&mut *tx)
    .await?;

    let settled_advances = if current.advance_deduction > 0.0 {
        sqlx::query(
            "UPDATE salary_advances SET remaining_balance = 0, status = ?, next_deduction_date = NULL WHERE employee_id = ? AND status = ?",
        )
        .bind(AdvanceStatus::Repaid.as_ref())
        .bind(current.employee_id)
        .bind(AdvanceStatus::Paid.as_ref())
        .execute(&mut *tx)
        .await?
        .rows_affected()
    } else {
        0
    };
    tx.commit().await?;

    info!(settlement_id, settled_advances, "Final settlement paid");
    get(pool, settlement_id).await
}

pub async fn cancel(pool: &MySqlPool, settlement_id: u64, reason: &str) -> AppResult<FinalSettlement> {
    if reason.trim().is_empty() {
        return Err(AppError::bad_request("A cancellation reason is required"));
    }

    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, settlement_id).await?;
    SettlementStatus::ensure_transition(&current.status, SettlementStatus::Cancelled)?;

    sqlx::query("UPDATE final_settlements SET status = ?, cancellation_reason = ? WHERE id = ?")
        .bind(SettlementStatus::Cancelled.as_ref())
        .bind(reason.trim())
        .bind(settlement_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(settlement_id, "Final settlement cancelled");
    get(pool, settlement_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculated() -> SettlementAmounts {
        SettlementAmounts {
            unpaid_salary: 1500.0,
            allowances: 300.0,
            leave_encashment: 408.0,
            gratuity_amount: 8400.0,
            bonus_amount: 0.0,
            advance_deduction: 500.0,
            other_deductions: 0.0,
        }
    }

    #[test]
    fn adjustments_only_touch_editable_parts() {
        let input: AdjustSettlement = serde_json::from_value(serde_json::json!({
            "bonus_amount": 1000.0,
            "other_deductions": 250.0
        }))
        .unwrap();

        let adjusted = input.apply(calculated()).unwrap();
        assert_eq!(adjusted.leave_encashment, 408.0);
        assert_eq!(adjusted.gratuity_amount, 8400.0);
        assert_eq!(adjusted.gross(), 11608.0);
        assert_eq!(adjusted.deductions(), 750.0);
        assert_eq!(adjusted.net(), 10858.0);
    }

    #[test]
    fn negative_adjustments_are_rejected() {
        let input = AdjustSettlement { other_deductions: Some(-10.0), ..AdjustSettlement::default() };
        assert!(matches!(input.apply(calculated()), Err(AppError::BadRequest(_))));
    }
}
