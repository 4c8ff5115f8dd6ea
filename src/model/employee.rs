use crate::error::AppError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

pub const FILE_NUMBER_PREFIX: &str = "EMP-";
pub const MAX_CONTRACT_HOURS_PER_DAY: u32 = 24;
pub const MAX_CONTRACT_DAYS_PER_MONTH: u32 = 31;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "file_number": "EMP-0001",
        "first_name": "John",
        "middle_name": null,
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+966500000000",
        "nationality": "SA",
        "department_id": 10,
        "designation_id": 3,
        "user_id": null,
        "hire_date": "2024-01-01",
        "status": "active",
        "basic_salary": 5000.0,
        "food_allowance": 300.0,
        "housing_allowance": 1200.0,
        "transport_allowance": 400.0,
        "hourly_rate": 25.0,
        "overtime_rate_multiplier": 1.5,
        "overtime_fixed_rate": 0.0,
        "contract_hours_per_day": 8,
        "contract_days_per_month": 30,
        "advance_salary_eligible": true
    })
)]
pub struct Employee {
    pub id: u64,
    pub file_number: String,
    pub first_name: String,
    #[schema(nullable = true)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: String,
    #[schema(nullable = true)]
    pub phone: Option<String>,
    #[schema(nullable = true)]
    pub nationality: Option<String>,
    #[schema(nullable = true)]
    pub department_id: Option<u64>,
    #[schema(nullable = true)]
    pub designation_id: Option<u64>,
    #[schema(nullable = true)]
    pub user_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    pub status: String,
    pub basic_salary: f64,
    pub food_allowance: f64,
    pub housing_allowance: f64,
    pub transport_allowance: f64,
    pub hourly_rate: f64,
    pub overtime_rate_multiplier: f64,
    pub overtime_fixed_rate: f64,
    pub contract_hours_per_day: u32,
    pub contract_days_per_month: u32,
    pub advance_salary_eligible: bool,
    #[serde(skip_serializing)]
    #[schema(value_type = Option<String>)]
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    Inactive,
    OnLeave,
    Resigned,
    Terminated,
}

impl Employee {
    pub fn pay(&self) -> PayProfile {
        PayProfile {
            basic_salary: self.basic_salary,
            food_allowance: self.food_allowance,
            housing_allowance: self.housing_allowance,
            transport_allowance: self.transport_allowance,
            hourly_rate: self.hourly_rate,
            overtime_rate_multiplier: self.overtime_rate_multiplier,
            overtime_fixed_rate: self.overtime_fixed_rate,
            contract_hours_per_day: self.contract_hours_per_day,
            contract_days_per_month: self.contract_days_per_month,
        }
    }
}

/// Salary components of an employee and the rates derived from them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct PayProfile {
    pub basic_salary: f64,
    pub food_allowance: f64,
    pub housing_allowance: f64,
    pub transport_allowance: f64,
    pub hourly_rate: f64,
    pub overtime_rate_multiplier: f64,
    pub overtime_fixed_rate: f64,
    pub contract_hours_per_day: u32,
    pub contract_days_per_month: u32,
}

impl PayProfile {
    pub fn total_allowances(&self) -> f64 {
        self.food_allowance + self.housing_allowance + self.transport_allowance
    }

    pub fn total_salary(&self) -> f64 {
        self.basic_salary + self.total_allowances()
    }

    pub fn daily_rate(&self) -> f64 {
        if self.contract_days_per_month == 0 {
            return 0.0;
        }
        self.basic_salary / self.contract_days_per_month as f64
    }

    pub fn calculated_hourly_rate(&self) -> f64 {
        if self.contract_days_per_month == 0 || self.contract_hours_per_day == 0 {
            return 0.0;
        }
        self.basic_salary / (f64::from(self.contract_days_per_month) * f64::from(self.contract_hours_per_day))
    }

    /// Fixed overtime rate wins over the multiplier when set.
    pub fn overtime_rate(&self) -> f64 {
        if self.overtime_fixed_rate > 0.0 {
            return self.overtime_fixed_rate;
        }

        let hourly = if self.hourly_rate > 0.0 {
            self.hourly_rate
        } else {
            self.calculated_hourly_rate()
        };
        hourly * self.overtime_rate_multiplier
    }

    pub fn absent_deduction(&self, absent_days: u32) -> f64 {
        if absent_days == 0 {
            return 0.0;
        }
        self.daily_rate() * absent_days as f64
    }

    pub fn overtime_pay(&self, overtime_hours: f64) -> f64 {
        if overtime_hours <= 0.0 {
            return 0.0;
        }
        self.overtime_rate() * overtime_hours
    }
}

/// Contract hours must fit in a day and contract days in a month.
pub fn check_contract_terms(hours_per_day: u32, days_per_month: u32) -> Result<(), AppError> {
    if !(1..=MAX_CONTRACT_HOURS_PER_DAY).contains(&hours_per_day) {
        return Err(AppError::bad_request(format!(
            "contract_hours_per_day must be between 1 and {}",
            MAX_CONTRACT_HOURS_PER_DAY
        )));
    }
    if !(1..=MAX_CONTRACT_DAYS_PER_MONTH).contains(&days_per_month) {
        return Err(AppError::bad_request(format!(
            "contract_days_per_month must be between 1 and {}",
            MAX_CONTRACT_DAYS_PER_MONTH
        )));
    }
    Ok(())
}

/// Next file number after `last`, e.g. `EMP-0041` -> `EMP-0042`.
///
/// Suffixes that do not parse count as zero, matching a fresh sequence.
pub fn next_file_number(last: Option<&str>) -> String {
    let last_number = last
        .and_then(|n| n.strip_prefix(FILE_NUMBER_PREFIX))
        .and_then(|suffix| suffix.trim().parse::<u64>().ok())
        .unwrap_or(0);

    format!("{}{:04}", FILE_NUMBER_PREFIX, last_number + 1)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> PayProfile {
        PayProfile {
            basic_salary: 6000.0,
            food_allowance: 300.0,
            housing_allowance: 1500.0,
            transport_allowance: 200.0,
            hourly_rate: 0.0,
            overtime_rate_multiplier: 1.5,
            overtime_fixed_rate: 0.0,
            contract_hours_per_day: 10,
            contract_days_per_month: 30,
        }
    }

    #[test]
    fn file_numbers_are_sequential_and_padded() {
        assert_eq!(next_file_number(None), "EMP-0001");
        assert_eq!(next_file_number(Some("EMP-0041")), "EMP-0042");
        assert_eq!(next_file_number(Some("EMP-9999")), "EMP-10000");
    }

    #[test]
    fn unparseable_file_number_restarts_sequence() {
        assert_eq!(next_file_number(Some("LEGACY-17")), "EMP-0001");
        assert_eq!(next_file_number(Some("EMP-abc")), "EMP-0001");
    }

    #[test]
    fn derived_rates() {
        let p = profile();
        assert_eq!(p.total_allowances(), 2000.0);
        assert_eq!(p.total_salary(), 8000.0);
        assert_eq!(p.daily_rate(), 200.0);
        assert_eq!(p.calculated_hourly_rate(), 20.0);
        // no explicit hourly rate, so the calculated one is multiplied
        assert_eq!(p.overtime_rate(), 30.0);
        assert_eq!(p.overtime_pay(4.0), 120.0);
        assert_eq!(p.absent_deduction(2), 400.0);
    }

    #[test]
    fn fixed_overtime_rate_wins() {
        let p = PayProfile { overtime_fixed_rate: 45.0, ..profile() };
        assert_eq!(p.overtime_rate(), 45.0);
    }

    #[test]
    fn zero_contract_terms_yield_zero_rates() {
        let p = PayProfile { contract_days_per_month: 0, ..profile() };
        assert_eq!(p.daily_rate(), 0.0);
        assert_eq!(p.calculated_hourly_rate(), 0.0);
        assert_eq!(p.absent_deduction(3), 0.0);
        assert_eq!(profile().overtime_pay(-1.0), 0.0);
    }

    #[test]
    fn huge_contract_terms_do_not_overflow() {
        let p = PayProfile {
            contract_hours_per_day: 70_000,
            contract_days_per_month: 70_000,
            ..profile()
        };
        assert!(p.calculated_hourly_rate() > 0.0);
        assert!(p.overtime_rate().is_finite());
    }

    #[test]
    fn contract_terms_are_bounded() {
        assert!(check_contract_terms(8, 30).is_ok());
        assert!(check_contract_terms(24, 31).is_ok());
        assert!(check_contract_terms(0, 30).is_err());
        assert!(check_contract_terms(25, 30).is_err());
        assert!(check_contract_terms(8, 0).is_err());
        assert!(check_contract_terms(8, 32).is_err());
        assert!(check_contract_terms(70_000, 70_000).is_err());
    }

    #[test]
    fn status_parses_snake_case() {
        assert_eq!("on_leave".parse::<EmployeeStatus>().ok(), Some(EmployeeStatus::OnLeave));
        assert_eq!(EmployeeStatus::Terminated.as_ref(), "terminated");
    }
}
