use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::employee::round2;
use crate::model::payroll::{Payroll, PayrollFigures, month_bounds};
use crate::model::salary_advance::{AdvanceStatus, SalaryAdvance};
use crate::model::timesheet::TimesheetStatus;
use crate::service::employee;
use crate::service::salary_advance::ADVANCE_SELECT;
use crate::utils::db_utils::{BindValues, Filters, PageParams};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const PAYROLL_SELECT: &str = r#"
    SELECT id, employee_id, month, base_salary, allowances, overtime_pay, bonus, deductions,
           advance_deduction, net_salary, created_at
    FROM payroll
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 1001)]
    pub employee_id: u64,
    /// Any day of the month; stored as the first
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub month: NaiveDate,
    #[schema(example = 50000.0)]
    pub base_salary: f64,
    #[serde(default)]
    pub allowances: f64,
    #[serde(default)]
    pub overtime_pay: f64,
    #[serde(default)]
    #[schema(example = 5000.0)]
    pub bonus: f64,
    #[serde(default)]
    #[schema(example = 2000.0)]
    pub deductions: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePayroll {
    #[schema(example = 52000.0)]
    pub base_salary: Option<f64>,
    pub allowances: Option<f64>,
    pub overtime_pay: Option<f64>,
    #[schema(example = 6000.0)]
    pub bonus: Option<f64>,
    #[schema(example = 2500.0)]
    pub deductions: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GeneratePayroll {
    pub employee_id: u64,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub month: NaiveDate,
    #[serde(default)]
    pub absent_days: u32,
    #[serde(default)]
    pub bonus: f64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date")]
    pub month: Option<NaiveDate>,
}

/// How a payroll run was put together.
#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedPayroll {
    pub payroll: Payroll,
    pub overtime_hours: f64,
    pub absent_days: u32,
    /// Advances an installment was withheld for
    pub advances_deducted: Vec<u64>,
}

/// Installment taken from one advance in a payroll run.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceInstallment {
    pub advance_id: u64,
    pub amount: f64,
    pub remaining_balance: f64,
}

/// Works out what each paid advance gives up this month.
pub fn plan_installments(advances: &[SalaryAdvance]) -> Vec<AdvanceInstallment> {
    advances
        .iter()
        .filter_map(|advance| {
            let amount = advance.monthly_deduction();
            (amount > 0.0).then(|| AdvanceInstallment {
                advance_id: advance.id,
                amount,
                remaining_balance: round2((advance.remaining_balance - amount).max(0.0)),
            })
        })
        .collect()
}

fn first_of_month(day: NaiveDate) -> AppResult<(NaiveDate, NaiveDate)> {
    month_bounds(day).ok_or_else(|| AppError::bad_request("Invalid payroll month"))
}

fn check_amounts(values: &[f64]) -> AppResult<()> {
    if values.iter().any(|v| *v < 0.0) {
        return Err(AppError::bad_request("Payroll amounts must not be negative"));
    }
    Ok(())
}

async fn ensure_new_month(tx: &mut Transaction<'_, MySql>, employee_id: u64, month: NaiveDate) -> AppResult<()> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM payroll WHERE employee_id = ? AND month = ?",
    )
    .bind(employee_id)
    .bind(month)
    .fetch_one(&mut **tx)
    .await?;

    if existing > 0 {
        return Err(AppError::conflict("Payroll already exists for this month"));
    }
    Ok(())
}

async fn insert(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
    month: NaiveDate,
    figures: &PayrollFigures,
) -> Result<u64, sqlx::Error> {
    let id = sqlx::query(
        r#"
        INSERT INTO payroll
            (employee_id, month, base_salary, allowances, overtime_pay, bonus, deductions,
             advance_deduction, net_salary)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(month)
    .bind(figures.base_salary)
    .bind(figures.allowances)
    .bind(figures.overtime_pay)
    .bind(figures.bonus)
    .bind(figures.deductions)
    .bind(figures.advance_deduction)
    .bind(figures.net())
    .execute(&mut **tx)
    .await?
    .last_insert_id();
    Ok(id)
}

pub async fn get(pool: &MySqlPool, payroll_id: u64) -> AppResult<Payroll> {
    sqlx::query_as::<_, Payroll>(&format!("{} WHERE id = ?", PAYROLL_SELECT))
        .bind(payroll_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Payroll not found"))
}

pub async fn create(pool: &MySqlPool, input: &CreatePayroll) -> AppResult<Payroll> {
    check_amounts(&[input.base_salary, input.allowances, input.overtime_pay, input.bonus, input.deductions])?;
    employee::get(pool, input.employee_id).await?;
    let (month, _) = first_of_month(input.month)?;

    let figures = PayrollFigures {
        base_salary: input.base_salary,
        allowances: input.allowances,
        overtime_pay: input.overtime_pay,
        bonus: input.bonus,
        deductions: input.deductions,
        advance_deduction: 0.0,
    };

    let mut tx = pool.begin().await?;
    ensure_new_month(&mut tx, input.employee_id, month).await?;
    let payroll_id = insert(&mut tx, input.employee_id, month, &figures).await?;
    tx.commit().await?;

    info!(payroll_id, employee_id = input.employee_id, %month, "Payroll created");
    get(pool, payroll_id).await
}

pub async fn update(pool: &MySqlPool, payroll_id: u64, input: &UpdatePayroll) -> AppResult<Payroll> {
    let current = get(pool, payroll_id).await?;

    let figures = PayrollFigures {
        base_salary: input.base_salary.unwrap_or(current.base_salary),
        allowances: input.allowances.unwrap_or(current.allowances),
        overtime_pay: input.overtime_pay.unwrap_or(current.overtime_pay),
        bonus: input.bonus.unwrap_or(current.bonus),
        deductions: input.deductions.unwrap_or(current.deductions),
        advance_deduction: current.advance_deduction,
    };
    check_amounts(&[figures.base_salary, figures.allowances, figures.overtime_pay, figures.bonus, figures.deductions])?;

    sqlx::query(
        r#"
        UPDATE payroll
        SET base_salary = ?, allowances = ?, overtime_pay = ?, bonus = ?, deductions = ?, net_salary = ?
        WHERE id = ?
        "#,
    )
    .bind(figures.base_salary)
    .bind(figures.allowances)
    .bind(figures.overtime_pay)
    .bind(figures.bonus)
    .bind(figures.deductions)
    .bind(figures.net())
    .bind(payroll_id)
    .execute(pool)
    .await?;

    info!(payroll_id, "Payroll updated");
    get(pool, payroll_id).await
}

/// Builds an employee's payroll for a month from their pay profile, approved
/// overtime and outstanding advances.
pub async fn generate(pool: &MySqlPool, input: &GeneratePayroll) -> AppResult<GeneratedPayroll> {
    check_amounts(&[input.bonus])?;
    let employee = employee::get(pool, input.employee_id).await?;
    let pay = employee.pay();
    let (month, month_end) = first_of_month(input.month)?;

    let mut tx = pool.begin().await?;
    ensure_new_month(&mut tx, employee.id, month).await?;

    let overtime_hours = sqlx::query_scalar::<_, f64>(
        r#"
        SELECT COALESCE(SUM(overtime_hours), 0)
        FROM timesheets
        WHERE employee_id = ? AND status = ? AND date BETWEEN ? AND ?
        "#,
    )
    .bind(employee.id)
    .bind(TimesheetStatus::Approved.as_ref())
    .bind(month)
    .bind(month_end)
    .fetch_one(&mut *tx)
    .await?;

    let advances = sqlx::query_as::<_, SalaryAdvance>(&format!(
        r#"{}
        WHERE employee_id = ? AND status = ? AND repayment_method = 'monthly_deduction'
          AND (next_deduction_date IS NULL OR next_deduction_date <= ?)
        ORDER BY id
        FOR UPDATE
        "#,
        ADVANCE_SELECT
    ))
    .bind(employee.id)
    .bind(AdvanceStatus::Paid.as_ref())
    .bind(month_end)
    .fetch_all(&mut *tx)
    .await?;

    let installments = plan_installments(&advances);
    let next_deduction = month
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::bad_request("Invalid payroll month"))?;

    for installment in &installments {
        let status = if installment.remaining_balance <= 0.0 {
            AdvanceStatus::Repaid
        } else {
            AdvanceStatus::Paid
        };
        debug!(advance_id = installment.advance_id, amount = installment.amount, "Withholding advance installment");

        sqlx::query(
            "UPDATE salary_advances SET remaining_balance = ?, status = ?, next_deduction_date = ? WHERE id = ?",
        )
        .bind(installment.remaining_balance)
        .bind(status.as_ref())
        .bind(next_deduction)
        .bind(installment.advance_id)
        .execute(&mut *tx)
        .await?;
    }

    let figures = PayrollFigures {
        base_salary: round2(pay.basic_salary),
        allowances: round2(pay.total_allowances()),
        overtime_pay: round2(pay.overtime_pay(overtime_hours)),
        bonus: round2(input.bonus),
        deductions: round2(pay.absent_deduction(input.absent_days)),
        advance_deduction: round2(installments.iter().map(|i| i.amount).sum()),
    };

    let payroll_id = insert(&mut tx, employee.id, month, &figures).await?;
    tx.commit().await?;

    info!(payroll_id, employee_id = employee.id, %month, net = figures.net(), "Payroll generated");

    Ok(GeneratedPayroll {
        payroll: get(pool, payroll_id).await?,
        overtime_hours,
        absent_days: input.absent_days,
        advances_deducted: installments.iter().map(|i| i.advance_id).collect(),
    })
}

pub async fn list(pool: &MySqlPool, user: &AuthUser, query: &PayrollQuery) -> AppResult<(Vec<Payroll>, PageParams, i64)> {
    let page = PageParams::new(query.page, query.per_page, 10);

    let employee_id = if user.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(user.own_employee_id()?)
    };
    let month = query.month.map(first_of_month).transpose()?.map(|(first, _)| first);

    let mut filters = Filters::new();
    filters.push_opt("employee_id = ?", employee_id);
    filters.push_opt("month = ?", month);
    let where_clause = filters.where_clause();

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM payroll {}", where_clause))
        .bind_values(filters.values())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, Payroll>(&format!(
        "{} {} ORDER BY month DESC, id DESC LIMIT ? OFFSET ?",
        PAYROLL_SELECT, where_clause
    ))
    .bind_values(filters.values())
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paid_advance(id: u64, approved: f64, installments: u32, remaining: f64) -> SalaryAdvance {
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        SalaryAdvance {
            id,
            employee_id: 1,
            amount: approved,
            approved_amount: Some(approved),
            reason: None,
            installments,
            repayment_method: "monthly_deduction".to_string(),
            status: "paid".to_string(),
            requested_date: day,
            approved_by: Some(1),
            approved_at: None,
            rejected_by: None,
            rejection_reason: None,
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            next_deduction_date: Some(day),
            remaining_balance: remaining,
            notes: None,
            created_at: day.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn installments_reduce_remaining_balance() {
        let plan = plan_installments(&[paid_advance(1, 900.0, 3, 900.0), paid_advance(2, 500.0, 2, 100.0)]);
        assert_eq!(
            plan,
            vec![
                AdvanceInstallment { advance_id: 1, amount: 300.0, remaining_balance: 600.0 },
                AdvanceInstallment { advance_id: 2, amount: 100.0, remaining_balance: 0.0 },
            ]
        );
    }

    #[test]
    fn settled_advances_are_skipped() {
        assert!(plan_installments(&[paid_advance(1, 900.0, 3, 0.0)]).is_empty());
    }

    #[test]
    fn generate_payload_defaults() {
        let input: GeneratePayroll =
            serde_json::from_value(serde_json::json!({ "employee_id": 1, "month": "2026-02-10" })).unwrap();
        assert_eq!(input.absent_days, 0);
        assert_eq!(first_of_month(input.month).unwrap().0, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
    }
}
