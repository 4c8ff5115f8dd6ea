use super::employee::round2;
use super::status::StatusFlow;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

pub const RENTAL_NUMBER_PREFIX: &str = "RENT-";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Rental {
    pub id: u64,
    #[schema(example = "RENT-2026-00001")]
    pub rental_number: String,
    #[schema(example = "Al Noor Contracting")]
    pub customer_name: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub expected_end_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub actual_end_date: Option<NaiveDate>,
    pub status: String,
    pub total_amount: f64,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    pub created_by: u64,
    #[schema(nullable = true)]
    pub completed_by: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RentalItem {
    pub id: u64,
    pub rental_id: u64,
    pub equipment_id: u64,
    pub daily_rate: f64,
    pub quantity: u32,
    #[schema(nullable = true)]
    pub operator_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RentalStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl StatusFlow for RentalStatus {
    const RECORD: &'static str = "rental";

    fn next_states(self) -> &'static [Self] {
        match self {
            RentalStatus::Pending => &[RentalStatus::Active, RentalStatus::Cancelled],
            RentalStatus::Active => &[RentalStatus::Completed, RentalStatus::Cancelled],
            RentalStatus::Completed | RentalStatus::Cancelled => &[],
        }
    }
}

impl Rental {
    pub fn duration_days(&self) -> i64 {
        rental_days(self.start_date, self.actual_end_date.unwrap_or(self.expected_end_date))
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == RentalStatus::Active.as_ref()
            && self.actual_end_date.is_none()
            && self.expected_end_date < today
    }
}

/// Billable days between two dates; a same-day rental bills one day.
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

/// `(daily_rate, quantity)` pairs priced over `days`.
pub fn rental_total(items: &[(f64, u32)], days: i64) -> f64 {
    round2(items.iter().map(|(rate, qty)| rate * *qty as f64).sum::<f64>() * days as f64)
}

/// Next number in the yearly sequence, e.g. `RENT-2026-00042`.
pub fn next_rental_number(last: Option<&str>, today: NaiveDate) -> String {
    let year_prefix = format!("{}{}-", RENTAL_NUMBER_PREFIX, today.year());

    let sequence = last
        .and_then(|n| n.strip_prefix(&year_prefix))
        .and_then(|seq| seq.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;

    format!("{}{:05}", year_prefix, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn rental_numbers_restart_each_year() {
        assert_eq!(next_rental_number(None, d("2026-02-01")), "RENT-2026-00001");
        assert_eq!(next_rental_number(Some("RENT-2026-00041"), d("2026-02-01")), "RENT-2026-00042");
        assert_eq!(next_rental_number(Some("RENT-2025-00900"), d("2026-01-01")), "RENT-2026-00001");
        assert_eq!(next_rental_number(Some("RENT-2026-99999"), d("2026-06-01")), "RENT-2026-100000");
        assert_eq!(next_rental_number(Some("RENT-2026-100000"), d("2026-06-01")), "RENT-2026-100001");
    }

    #[test]
    fn totals_multiply_rate_quantity_and_days() {
        assert_eq!(rental_total(&[(100.0, 2), (50.5, 1)], 3), 751.5);
        assert_eq!(rental_days(d("2026-01-01"), d("2026-01-01")), 1);
        assert_eq!(rental_days(d("2026-01-01"), d("2026-01-11")), 10);
    }

    #[test]
    fn workflow_moves_forward_only() {
        assert!(RentalStatus::Pending.can_transition_to(RentalStatus::Active));
        assert!(!RentalStatus::Pending.can_transition_to(RentalStatus::Completed));
        assert!(RentalStatus::Active.can_transition_to(RentalStatus::Cancelled));
        assert!(RentalStatus::Completed.is_final());
    }
}
