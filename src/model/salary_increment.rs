use super::employee::round2;
use super::status::StatusFlow;
use crate::error::AppError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SalaryIncrement {
    pub id: u64,
    pub employee_id: u64,
    pub current_base_salary: f64,
    pub current_food_allowance: f64,
    pub current_housing_allowance: f64,
    pub current_transport_allowance: f64,
    pub new_base_salary: f64,
    pub new_food_allowance: f64,
    pub new_housing_allowance: f64,
    pub new_transport_allowance: f64,
    pub increment_type: String,
    #[schema(nullable = true)]
    pub increment_percentage: Option<f64>,
    #[schema(nullable = true)]
    pub increment_amount: Option<f64>,
    pub reason: String,
    #[schema(value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    pub status: String,
    pub requested_by: u64,
    #[schema(nullable = true)]
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub rejected_by: Option<u64>,
    #[schema(nullable = true)]
    pub rejection_reason: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub applied_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl SalaryIncrement {
    pub fn current(&self) -> SalaryComponents {
        SalaryComponents {
            base_salary: self.current_base_salary,
            food_allowance: self.current_food_allowance,
            housing_allowance: self.current_housing_allowance,
            transport_allowance: self.current_transport_allowance,
        }
    }

    pub fn proposed(&self) -> SalaryComponents {
        SalaryComponents {
            base_salary: self.new_base_salary,
            food_allowance: self.new_food_allowance,
            housing_allowance: self.new_housing_allowance,
            transport_allowance: self.new_transport_allowance,
        }
    }

    /// Monthly raise across all components.
    pub fn total_increment_amount(&self) -> f64 {
        round2(self.proposed().total() - self.current().total())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncrementType {
    Percentage,
    Amount,
    Promotion,
    AnnualReview,
    Performance,
    MarketAdjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IncrementStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
}

impl StatusFlow for IncrementStatus {
    const RECORD: &'static str = "salary increment";

    fn next_states(self) -> &'static [Self] {
        match self {
            IncrementStatus::Pending => &[IncrementStatus::Approved, IncrementStatus::Rejected],
            IncrementStatus::Approved => &[IncrementStatus::Applied],
            IncrementStatus::Rejected | IncrementStatus::Applied => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalaryComponents {
    pub base_salary: f64,
    pub food_allowance: f64,
    pub housing_allowance: f64,
    pub transport_allowance: f64,
}

impl SalaryComponents {
    pub fn total(&self) -> f64 {
        self.base_salary + self.food_allowance + self.housing_allowance + self.transport_allowance
    }
}

/// What a requester asks for; which fields matter depends on the increment type.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct IncrementTerms {
    pub increment_percentage: Option<f64>,
    pub increment_amount: Option<f64>,
    #[serde(default)]
    pub apply_to_allowances: bool,
    pub new_base_salary: Option<f64>,
    pub new_food_allowance: Option<f64>,
    pub new_housing_allowance: Option<f64>,
    pub new_transport_allowance: Option<f64>,
}

/// Computes the salary an increment would produce.
pub fn calculate_new_salary(
    current: SalaryComponents,
    kind: IncrementType,
    terms: &IncrementTerms,
) -> Result<SalaryComponents, AppError> {
    let proposed = match kind {
        IncrementType::Percentage => {
            let pct = terms
                .increment_percentage
                .filter(|p| *p > 0.0)
                .ok_or_else(|| AppError::bad_request("increment_percentage must be a positive number"))?;
            let factor = 1.0 + pct / 100.0;

            let mut next = current;
            next.base_salary = current.base_salary * factor;
            if terms.apply_to_allowances {
                next.food_allowance = current.food_allowance * factor;
                next.housing_allowance = current.housing_allowance * factor;
                next.transport_allowance = current.transport_allowance * factor;
            }
            next
        }
        IncrementType::Amount => {
            let amount = terms
                .increment_amount
                .filter(|a| *a > 0.0)
                .ok_or_else(|| AppError::bad_request("increment_amount must be a positive number"))?;
            SalaryComponents {
                base_salary: current.base_salary + amount,
                ..current
            }
        }
        IncrementType::Promotion
        | IncrementType::AnnualReview
        | IncrementType::Performance
        | IncrementType::MarketAdjustment => SalaryComponents {
            base_salary: terms.new_base_salary.unwrap_or(current.base_salary),
            food_allowance: terms.new_food_allowance.unwrap_or(current.food_allowance),
            housing_allowance: terms.new_housing_allowance.unwrap_or(current.housing_allowance),
            transport_allowance: terms.new_transport_allowance.unwrap_or(current.transport_allowance),
        },
    };

    Ok(SalaryComponents {
        base_salary: round2(proposed.base_salary),
        food_allowance: round2(proposed.food_allowance),
        housing_allowance: round2(proposed.housing_allowance),
        transport_allowance: round2(proposed.transport_allowance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> SalaryComponents {
        SalaryComponents {
            base_salary: 5000.0,
            food_allowance: 300.0,
            housing_allowance: 1000.0,
            transport_allowance: 200.0,
        }
    }

    #[test]
    fn percentage_raises_base_only_by_default() {
        let terms = IncrementTerms { increment_percentage: Some(10.0), ..Default::default() };
        let next = calculate_new_salary(current(), IncrementType::Percentage, &terms).unwrap();
        assert_eq!(next.base_salary, 5500.0);
        assert_eq!(next.housing_allowance, 1000.0);
    }

    #[test]
    fn percentage_can_cover_allowances() {
        let terms = IncrementTerms {
            increment_percentage: Some(10.0),
            apply_to_allowances: true,
            ..Default::default()
        };
        let next = calculate_new_salary(current(), IncrementType::Percentage, &terms).unwrap();
        assert_eq!(next.food_allowance, 330.0);
        assert_eq!(next.total(), 7150.0);
    }

    #[test]
    fn amount_increment_requires_amount() {
        let err = calculate_new_salary(current(), IncrementType::Amount, &IncrementTerms::default());
        assert!(err.is_err());

        let terms = IncrementTerms { increment_amount: Some(750.0), ..Default::default() };
        let next = calculate_new_salary(current(), IncrementType::Amount, &terms).unwrap();
        assert_eq!(next.base_salary, 5750.0);
    }

    #[test]
    fn promotion_takes_explicit_values_and_keeps_the_rest() {
        let terms = IncrementTerms {
            new_base_salary: Some(7000.0),
            new_housing_allowance: Some(1500.0),
            ..Default::default()
        };
        let next = calculate_new_salary(current(), IncrementType::Promotion, &terms).unwrap();
        assert_eq!(next.base_salary, 7000.0);
        assert_eq!(next.housing_allowance, 1500.0);
        assert_eq!(next.transport_allowance, 200.0);
    }

    #[test]
    fn approved_increment_can_only_be_applied() {
        assert_eq!(IncrementStatus::Approved.next_states(), &[IncrementStatus::Applied]);
        assert!(IncrementStatus::Applied.is_final());
        assert_eq!("market_adjustment".parse::<IncrementType>().ok(), Some(IncrementType::MarketAdjustment));
    }
}
