use super::employee::round2;
use chrono::{Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

const DAYS_PER_YEAR: f64 = 365.25;
pub const MAX_USEFUL_LIFE_YEARS: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EquipmentDepreciation {
    pub id: u64,
    pub equipment_id: u64,
    #[schema(example = "straight_line")]
    pub method: String,
    #[schema(example = 250000.0)]
    pub initial_value: f64,
    #[schema(example = 25000.0)]
    pub residual_value: f64,
    #[schema(example = 10)]
    pub useful_life_years: u32,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(nullable = true)]
    pub updated_by: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DepreciationMethod {
    StraightLine,
    DoubleDeclining,
    SumOfYears,
}

/// One year of a depreciation schedule.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScheduleYear {
    pub year: u32,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub starting_value: f64,
    pub ending_value: f64,
    pub depreciation_amount: f64,
    pub accumulated_depreciation: f64,
}

/// How an asset loses value from `start_date` until it reaches its residual value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepreciationPlan {
    pub method: DepreciationMethod,
    pub initial_value: f64,
    pub residual_value: f64,
    pub useful_life_years: u32,
    pub start_date: NaiveDate,
}

impl DepreciationPlan {
    pub fn check(&self) -> Result<(), String> {
        if !self.initial_value.is_finite() || self.initial_value <= 0.0 {
            return Err("initial_value must be positive".to_string());
        }
        if !self.residual_value.is_finite() || self.residual_value < 0.0 || self.residual_value > self.initial_value {
            return Err("residual_value must be between 0 and initial_value".to_string());
        }
        if !(1..=MAX_USEFUL_LIFE_YEARS).contains(&self.useful_life_years) {
            return Err(format!("useful_life_years must be between 1 and {}", MAX_USEFUL_LIFE_YEARS));
        }
        Ok(())
    }

    /// Book value after `years` of service, never below the residual value.
    pub fn value_after(&self, years: f64) -> f64 {
        if years <= 0.0 {
            return round2(self.initial_value);
        }
        let life = f64::from(self.useful_life_years);
        if years >= life {
            return round2(self.residual_value);
        }

        let value = match self.method {
            DepreciationMethod::StraightLine => {
                self.initial_value - (self.initial_value - self.residual_value) / life * years
            }
            DepreciationMethod::DoubleDeclining => self.declining_value(years),
            DepreciationMethod::SumOfYears => self.sum_of_years_value(years),
        };
        round2(value.max(self.residual_value))
    }

    /// Each year takes the larger of the double-declining charge and straight line over the remaining life.
    fn declining_value(&self, years: f64) -> f64 {
        let life = self.useful_life_years;
        let rate = 2.0 / f64::from(life);
        let full_years = years.floor() as u32;

        let charge = |value: f64, year: u32| {
            let remaining = f64::from(life - year);
            (value * rate).max((value - self.residual_value) / remaining)
        };

        let mut value = self.initial_value;
        for year in 0..full_years {
            value = (value - charge(value, year)).max(self.residual_value);
        }
        let partial = years - f64::from(full_years);
        value - charge(value, full_years) * partial
    }

    fn sum_of_years_value(&self, years: f64) -> f64 {
        let life = f64::from(self.useful_life_years);
        let digits = life * (life + 1.0) / 2.0;
        let depreciable = self.initial_value - self.residual_value;
        let full_years = years.floor();

        let mut value = self.initial_value;
        for year in 0..full_years as u32 {
            value -= depreciable * (life - f64::from(year)) / digits;
        }
        value - depreciable * (life - full_years) * (years - full_years) / digits
    }

    pub fn current_value(&self, as_of: NaiveDate) -> f64 {
        let days = (as_of - self.start_date).num_days();
        self.value_after(days as f64 / DAYS_PER_YEAR)
    }

    pub fn schedule(&self) -> Vec<ScheduleYear> {
        let mut rows = Vec::with_capacity(self.useful_life_years as usize);
        let mut start_date = self.start_date;
        for year in 1..=self.useful_life_years {
            let end_date = start_date.checked_add_months(Months::new(12)).unwrap_or(start_date);
            let starting_value = self.value_after(f64::from(year - 1));
            let ending_value = self.value_after(f64::from(year));
            rows.push(ScheduleYear {
                year,
                start_date,
                end_date,
                starting_value,
                ending_value,
                depreciation_amount: round2(starting_value - ending_value),
                accumulated_depreciation: round2(self.initial_value - ending_value),
            });
            start_date = end_date;
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(method: DepreciationMethod) -> DepreciationPlan {
        DepreciationPlan {
            method,
            initial_value: 10000.0,
            residual_value: 1000.0,
            useful_life_years: 5,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn straight_line_loses_the_same_each_year() {
        let p = plan(DepreciationMethod::StraightLine);
        assert_eq!(p.value_after(2.0), 6400.0);
        assert_eq!(p.value_after(2.5), 5500.0);
        assert_eq!(p.value_after(12.0), 1000.0);
        assert_eq!(p.current_value(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()), 10000.0);
    }

    #[test]
    fn double_declining_stops_at_the_residual_value() {
        let p = plan(DepreciationMethod::DoubleDeclining);
        assert_eq!(p.value_after(1.0), 6000.0);
        assert_eq!(p.value_after(2.0), 3600.0);
        assert_eq!(p.value_after(3.0), 2160.0);
        assert_eq!(p.value_after(4.0), 1296.0);
        assert_eq!(p.value_after(4.5), 1036.8);
        assert_eq!(p.value_after(5.0), 1000.0);
    }

    #[test]
    fn sum_of_years_front_loads_the_charge() {
        let p = plan(DepreciationMethod::SumOfYears);
        assert_eq!(p.value_after(1.0), 7000.0);
        assert_eq!(p.value_after(2.0), 4600.0);
        assert_eq!(p.value_after(2.5), 3700.0);
        assert_eq!(p.value_after(4.0), 1600.0);
    }

    #[test]
    fn schedule_covers_the_useful_life() {
        let rows = plan(DepreciationMethod::StraightLine).schedule();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.depreciation_amount == 1800.0));
        assert_eq!(rows[0].end_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(rows[4].ending_value, 1000.0);
        assert_eq!(rows[4].accumulated_depreciation, 9000.0);
    }

    #[test]
    fn plans_are_checked() {
        assert!(plan(DepreciationMethod::StraightLine).check().is_ok());
        let bad_residual = DepreciationPlan { residual_value: 20000.0, ..plan(DepreciationMethod::StraightLine) };
        assert!(bad_residual.check().is_err());
        let no_life = DepreciationPlan { useful_life_years: 0, ..plan(DepreciationMethod::StraightLine) };
        assert!(no_life.check().is_err());
    }

    #[test]
    fn methods_use_snake_case_names() {
        assert_eq!(DepreciationMethod::DoubleDeclining.as_ref(), "double_declining");
        assert_eq!("sum_of_years".parse::<DepreciationMethod>().unwrap(), DepreciationMethod::SumOfYears);
    }
}
