use super::status::StatusFlow;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

pub const MIN_EXTENSION_REASON_LEN: usize = 10;
pub const MIN_REJECTION_REASON_LEN: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RentalExtension {
    pub id: u64,
    pub rental_id: u64,
    #[schema(value_type = String, format = "date")]
    pub previous_end_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub new_end_date: NaiveDate,
    #[schema(example = "Site work delayed by weather")]
    pub reason: String,
    pub status: String,
    pub requested_by: u64,
    #[schema(nullable = true)]
    pub reviewed_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub rejection_reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExtensionStatus {
    Pending,
    Approved,
    Rejected,
}

impl StatusFlow for ExtensionStatus {
    const RECORD: &'static str = "rental extension";

    fn next_states(self) -> &'static [Self] {
        match self {
            ExtensionStatus::Pending => &[ExtensionStatus::Approved, ExtensionStatus::Rejected],
            ExtensionStatus::Approved | ExtensionStatus::Rejected => &[],
        }
    }
}

/// A new end date must lie in the future and past the rental's current end.
pub fn check_new_end_date(current_end: NaiveDate, new_end: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if new_end <= today {
        return Err("new_end_date must be in the future".to_string());
    }
    if new_end <= current_end {
        return Err(format!("new_end_date must be after the current end date {}", current_end));
    }
    Ok(())
}

pub fn check_reason(reason: &str, min_len: usize) -> Result<&str, String> {
    let reason = reason.trim();
    if reason.chars().count() < min_len {
        return Err(format!("Reason must be at least {} characters", min_len));
    }
    Ok(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn new_end_must_move_forward() {
        let today = d("2026-10-18");
        assert!(check_new_end_date(d("2026-10-25"), d("2026-11-01"), today).is_ok());
        assert!(check_new_end_date(d("2026-10-25"), d("2026-10-25"), today).is_err());
        assert!(check_new_end_date(d("2026-10-10"), d("2026-10-18"), today).is_err());
        // overdue rentals may still be extended into the future
        assert!(check_new_end_date(d("2026-10-10"), d("2026-10-19"), today).is_ok());
    }

    #[test]
    fn reasons_are_trimmed_before_counting() {
        assert_eq!(check_reason("  Weather delay  ", MIN_EXTENSION_REASON_LEN), Ok("Weather delay"));
        assert!(check_reason("   short    ", MIN_EXTENSION_REASON_LEN).is_err());
        assert!(check_reason("Late", MIN_REJECTION_REASON_LEN).is_err());
    }

    #[test]
    fn reviewed_extensions_are_final() {
        assert!(ExtensionStatus::Pending.can_transition_to(ExtensionStatus::Rejected));
        assert!(ExtensionStatus::Approved.is_final());
        assert!(ExtensionStatus::Rejected.is_final());
    }
}
