use super::employee::round2;
use super::status::StatusFlow;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Days of basic salary paid per year of service.
pub const GRATUITY_DAYS_PER_YEAR: f64 = 21.0;
/// Paid annual leave a full year of service earns.
pub const ANNUAL_LEAVE_DAYS: f64 = 30.0;
const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct FinalSettlement {
    pub id: u64,
    pub employee_id: u64,
    #[schema(nullable = true)]
    pub resignation_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub last_working_day: NaiveDate,
    #[schema(example = 3.42)]
    pub service_years: f64,
    pub basic_salary: f64,
    pub unpaid_salary: f64,
    pub allowances: f64,
    pub leave_encashment: f64,
    pub gratuity_amount: f64,
    pub bonus_amount: f64,
    pub advance_deduction: f64,
    pub other_deductions: f64,
    pub gross_amount: f64,
    pub total_deductions: f64,
    pub net_amount: f64,
    pub status: String,
    #[schema(nullable = true)]
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub payment_method: Option<String>,
    #[schema(nullable = true)]
    pub payment_reference: Option<String>,
    #[schema(nullable = true)]
    pub cancellation_reason: Option<String>,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl FinalSettlement {
    pub fn amounts(&self) -> SettlementAmounts {
        SettlementAmounts {
            unpaid_salary: self.unpaid_salary,
            allowances: self.allowances,
            leave_encashment: self.leave_encashment,
            gratuity_amount: self.gratuity_amount,
            bonus_amount: self.bonus_amount,
            advance_deduction: self.advance_deduction,
            other_deductions: self.other_deductions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl StatusFlow for SettlementStatus {
    const RECORD: &'static str = "final settlement";

    fn next_states(self) -> &'static [Self] {
        match self {
            SettlementStatus::Pending => &[SettlementStatus::Approved, SettlementStatus::Cancelled],
            SettlementStatus::Approved => &[SettlementStatus::Paid, SettlementStatus::Cancelled],
            SettlementStatus::Paid | SettlementStatus::Cancelled => &[],
        }
    }
}

/// What the employee is owed and owes at the time they leave.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementFacts {
    pub basic_salary: f64,
    /// Monthly food, housing and transport allowances together
    pub monthly_allowances: f64,
    pub hire_date: NaiveDate,
    pub last_working_day: NaiveDate,
    /// False when payroll already covers the final month
    pub final_month_unpaid: bool,
    /// Approved annual leave taken in the year of leaving
    pub annual_leave_taken: f64,
    /// Paid-out advances not yet repaid
    pub outstanding_advances: f64,
}

/// Amounts a settlement is made of; the totals follow from the parts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SettlementAmounts {
    pub unpaid_salary: f64,
    pub allowances: f64,
    pub leave_encashment: f64,
    pub gratuity_amount: f64,
    pub bonus_amount: f64,
    pub advance_deduction: f64,
    pub other_deductions: f64,
}

impl SettlementAmounts {
    pub fn gross(&self) -> f64 {
        round2(self.unpaid_salary + self.allowances + self.leave_encashment + self.gratuity_amount + self.bonus_amount)
    }

    pub fn deductions(&self) -> f64 {
        round2(self.advance_deduction + self.other_deductions)
    }

    /// May be negative when advances exceed what is owed.
    pub fn net(&self) -> f64 {
        round2(self.gross() - self.deductions())
    }

    pub fn has_negative_part(&self) -> bool {
        [
            self.unpaid_salary,
            self.allowances,
            self.leave_encashment,
            self.gratuity_amount,
            self.bonus_amount,
            self.advance_deduction,
            self.other_deductions,
        ]
        .iter()
        .any(|v| *v < 0.0 || !v.is_finite())
    }
}

/// Whole and fractional years between joining and leaving.
pub fn service_years(hire_date: NaiveDate, last_working_day: NaiveDate) -> f64 {
    let days = (last_working_day - hire_date).num_days().max(0);
    round2(days as f64 / 365.25)
}

/// Gratuity is earned only after a full year of service.
pub fn gratuity(basic_salary: f64, years: f64) -> f64 {
    if years < 1.0 {
        return 0.0;
    }
    round2(basic_salary / DAYS_PER_MONTH * GRATUITY_DAYS_PER_YEAR * years)
}

/// Annual leave earned so far in the year of leaving, less what was already taken.
pub fn unused_leave_days(last_working_day: NaiveDate, hire_date: NaiveDate, taken: f64) -> f64 {
    let year_start = NaiveDate::from_ymd_opt(last_working_day.year(), 1, 1).unwrap_or(last_working_day);
    let accrual_start = year_start.max(hire_date);
    let days_in_year = if last_working_day.leap_year() { 366.0 } else { 365.0 };

    let worked = ((last_working_day - accrual_start).num_days() + 1).max(0) as f64;
    round2((ANNUAL_LEAVE_DAYS * worked / days_in_year - taken).max(0.0))
}

/// Days of the given leaves that fall between New Year and the last working day.
pub fn leave_taken_in_final_year(leaves: &[(NaiveDate, NaiveDate)], last_working_day: NaiveDate) -> f64 {
    let year_start = NaiveDate::from_ymd_opt(last_working_day.year(), 1, 1).unwrap_or(last_working_day);
    leaves
        .iter()
        .map(|(start, end)| {
            let from = (*start).max(year_start);
            let to = (*end).min(last_working_day);
            ((to - from).num_days() + 1).max(0) as f64
        })
        .sum()
}

pub fn calculate_settlement(facts: &SettlementFacts) -> (f64, SettlementAmounts) {
    let years = service_years(facts.hire_date, facts.last_working_day);
    let daily_basic = facts.basic_salary / DAYS_PER_MONTH;

    // the final month is paid pro rata for the days worked in it
    let days_worked = f64::from(facts.last_working_day.day()).min(DAYS_PER_MONTH);
    let (unpaid_salary, allowances) = if facts.final_month_unpaid {
        (
            round2(daily_basic * days_worked),
            round2(facts.monthly_allowances / DAYS_PER_MONTH * days_worked),
        )
    } else {
        (0.0, 0.0)
    };

    let leave_days = unused_leave_days(facts.last_working_day, facts.hire_date, facts.annual_leave_taken);

    let amounts = SettlementAmounts {
        unpaid_salary,
        allowances,
        leave_encashment: round2(daily_basic * leave_days),
        gratuity_amount: gratuity(facts.basic_salary, years),
        bonus_amount: 0.0,
        advance_deduction: round2(facts.outstanding_advances.max(0.0)),
        other_deductions: 0.0,
    };
    (years, amounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn facts() -> SettlementFacts {
        SettlementFacts {
            basic_salary: 3000.0,
            monthly_allowances: 600.0,
            hire_date: d("2022-03-15"),
            last_working_day: d("2026-03-15"),
            final_month_unpaid: true,
            annual_leave_taken: 2.0,
            outstanding_advances: 500.0,
        }
    }

    #[test]
    fn gratuity_needs_a_full_year() {
        assert_eq!(gratuity(3000.0, 0.99), 0.0);
        assert_eq!(gratuity(3000.0, 1.0), 2100.0);
        assert_eq!(gratuity(3000.0, 2.5), 5250.0);
    }

    #[test]
    fn service_years_count_from_joining() {
        assert_eq!(service_years(d("2022-03-15"), d("2026-03-15")), 4.0);
        assert_eq!(service_years(d("2026-03-15"), d("2026-01-01")), 0.0);
    }

    #[test]
    fn leave_accrues_from_the_later_of_new_year_and_joining() {
        // 74 of 365 days worked in 2026
        assert_eq!(unused_leave_days(d("2026-03-15"), d("2020-01-01"), 0.0), 6.08);
        assert_eq!(unused_leave_days(d("2026-03-15"), d("2026-03-01"), 0.0), 1.23);
        assert_eq!(unused_leave_days(d("2026-03-15"), d("2020-01-01"), 10.0), 0.0);
    }

    #[test]
    fn leave_is_clipped_to_the_final_year() {
        let leaves = [
            (d("2025-12-30"), d("2026-01-02")),
            (d("2026-02-10"), d("2026-02-11")),
            (d("2026-03-14"), d("2026-03-20")),
            (d("2025-06-01"), d("2025-06-05")),
        ];
        assert_eq!(leave_taken_in_final_year(&leaves, d("2026-03-15")), 6.0);
    }

    #[test]
    fn settlement_pays_the_final_month_and_recovers_advances() {
        let (years, amounts) = calculate_settlement(&facts());
        assert_eq!(years, 4.0);
        assert_eq!(amounts.unpaid_salary, 1500.0);
        assert_eq!(amounts.allowances, 300.0);
        assert_eq!(amounts.gratuity_amount, 8400.0);
        // (30 * 74 / 365 - 2) days of 100
        assert_eq!(amounts.leave_encashment, 408.0);
        assert_eq!(amounts.advance_deduction, 500.0);
        assert_eq!(amounts.gross(), 10608.0);
        assert_eq!(amounts.net(), 10108.0);
    }

    #[test]
    fn paid_final_month_is_not_paid_twice() {
        let (_, amounts) = calculate_settlement(&SettlementFacts { final_month_unpaid: false, ..facts() });
        assert_eq!(amounts.unpaid_salary, 0.0);
        assert_eq!(amounts.allowances, 0.0);
    }

    #[test]
    fn paid_and_cancelled_are_final() {
        assert!(SettlementStatus::Pending.can_transition_to(SettlementStatus::Approved));
        assert!(!SettlementStatus::Pending.can_transition_to(SettlementStatus::Paid));
        assert!(SettlementStatus::Approved.can_transition_to(SettlementStatus::Cancelled));
        assert!(SettlementStatus::Paid.is_final());
    }

    #[test]
    fn negative_parts_are_detected() {
        let amounts = SettlementAmounts { bonus_amount: -1.0, ..SettlementAmounts::default() };
        assert!(amounts.has_negative_part());
        assert!(!SettlementAmounts::default().has_negative_part());
    }
}
