use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payroll {
    pub id: u64,
    pub employee_id: u64,
    /// First day of the paid month
    #[schema(value_type = String, format = "date", example = "2026-01-01")]
    pub month: NaiveDate,
    pub base_salary: f64,
    pub allowances: f64,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub advance_deduction: f64,
    pub net_salary: f64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// Gross and net pay of one payroll period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PayrollFigures {
    pub base_salary: f64,
    pub allowances: f64,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub advance_deduction: f64,
}

impl PayrollFigures {
    pub fn gross(&self) -> f64 {
        self.base_salary + self.allowances + self.overtime_pay + self.bonus
    }

    pub fn net(&self) -> f64 {
        super::employee::round2(self.gross() - self.deductions - self.advance_deduction)
    }
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first = day.with_day(1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_subtracts_every_deduction() {
        let f = PayrollFigures {
            base_salary: 5000.0,
            allowances: 1000.0,
            overtime_pay: 250.5,
            bonus: 100.0,
            deductions: 400.0,
            advance_deduction: 500.0,
        };
        assert_eq!(f.gross(), 6350.5);
        assert_eq!(f.net(), 5450.5);
    }

    #[test]
    fn month_bounds_handle_short_months() {
        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(month_bounds(d("2026-02-17")), Some((d("2026-02-01"), d("2026-02-28"))));
        assert_eq!(month_bounds(d("2028-02-01")), Some((d("2028-02-01"), d("2028-02-29"))));
        assert_eq!(month_bounds(d("2026-12-31")), Some((d("2026-12-01"), d("2026-12-31"))));
    }
}
