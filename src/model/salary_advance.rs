use super::employee::round2;
use super::status::StatusFlow;
use crate::error::AppError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SalaryAdvance {
    pub id: u64,
    pub employee_id: u64,
    pub amount: f64,
    #[schema(nullable = true)]
    pub approved_amount: Option<f64>,
    #[schema(nullable = true)]
    pub reason: Option<String>,
    pub installments: u32,
    pub repayment_method: String,
    pub status: String,
    #[schema(value_type = String, format = "date")]
    pub requested_date: NaiveDate,
    #[schema(nullable = true)]
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub rejected_by: Option<u64>,
    #[schema(nullable = true)]
    pub rejection_reason: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub payment_method: Option<String>,
    #[schema(nullable = true)]
    pub payment_reference: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub next_deduction_date: Option<NaiveDate>,
    pub remaining_balance: f64,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AdvanceStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
    Repaid,
}

impl StatusFlow for AdvanceStatus {
    const RECORD: &'static str = "salary advance";

    fn next_states(self) -> &'static [Self] {
        match self {
            AdvanceStatus::Pending => &[AdvanceStatus::Approved, AdvanceStatus::Rejected],
            AdvanceStatus::Approved => &[AdvanceStatus::Paid, AdvanceStatus::Rejected],
            AdvanceStatus::Paid => &[AdvanceStatus::Repaid],
            AdvanceStatus::Rejected | AdvanceStatus::Repaid => &[],
        }
    }
}

/// Rejects a request that would push outstanding advances past `ratio` of the basic salary.
pub fn check_eligibility(basic_salary: f64, ratio: f64, outstanding: f64, amount: f64) -> Result<(), AppError> {
    if amount <= 0.0 {
        return Err(AppError::bad_request("Advance amount must be positive"));
    }

    let max_amount = round2(basic_salary * ratio);
    if outstanding + amount > max_amount {
        return Err(AppError::unprocessable(format!(
            "Total advance amount cannot exceed {:.0}% of monthly salary (Max: {:.2}, outstanding: {:.2})",
            ratio * 100.0,
            max_amount,
            outstanding
        )));
    }

    Ok(())
}

impl SalaryAdvance {
    /// Installment withheld from each payroll while the advance is being repaid.
    pub fn monthly_deduction(&self) -> f64 {
        if self.status != AdvanceStatus::Paid.as_ref() || self.installments == 0 {
            return 0.0;
        }

        let principal = self.approved_amount.unwrap_or(self.amount);
        round2((principal / self.installments as f64).min(self.remaining_balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(status: AdvanceStatus) -> SalaryAdvance {
        SalaryAdvance {
            id: 1,
            employee_id: 1,
            amount: 1200.0,
            approved_amount: Some(900.0),
            reason: None,
            installments: 3,
            repayment_method: "monthly_deduction".to_string(),
            status: status.to_string(),
            requested_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejection_reason: None,
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            next_deduction_date: None,
            remaining_balance: 900.0,
            notes: None,
            created_at: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn eligibility_counts_outstanding_advances() {
        assert!(check_eligibility(4000.0, 0.5, 0.0, 2000.0).is_ok());
        assert!(check_eligibility(4000.0, 0.5, 1500.0, 600.0).is_err());
        assert!(check_eligibility(4000.0, 0.5, 0.0, 0.0).is_err());
    }

    #[test]
    fn only_paid_advances_are_deducted() {
        assert_eq!(advance(AdvanceStatus::Paid).monthly_deduction(), 300.0);
        assert_eq!(advance(AdvanceStatus::Approved).monthly_deduction(), 0.0);
    }

    #[test]
    fn last_installment_is_capped_by_balance() {
        let mut a = advance(AdvanceStatus::Paid);
        a.remaining_balance = 120.0;
        assert_eq!(a.monthly_deduction(), 120.0);
    }

    #[test]
    fn paid_advance_cannot_be_rejected() {
        assert!(!AdvanceStatus::Paid.can_transition_to(AdvanceStatus::Rejected));
        assert!(AdvanceStatus::Approved.can_transition_to(AdvanceStatus::Paid));
    }
}
