use super::status::StatusFlow;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Resignation {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub resignation_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub last_working_day: NaiveDate,
    pub reason: String,
    pub status: String,
    pub submitted_by: u64,
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
pub enum ResignationStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl StatusFlow for ResignationStatus {
    const RECORD: &'static str = "resignation";

    fn next_states(self) -> &'static [Self] {
        match self {
            ResignationStatus::Pending => &[
                ResignationStatus::Approved,
                ResignationStatus::Rejected,
                ResignationStatus::Withdrawn,
            ],
            _ => &[],
        }
    }
}

/// Number of notice days between handing in the resignation and leaving.
pub fn notice_days(resignation_date: NaiveDate, last_working_day: NaiveDate) -> i64 {
    (last_working_day - resignation_date).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reviewed_resignations_are_final() {
        assert!(ResignationStatus::Pending.can_transition_to(ResignationStatus::Withdrawn));
        assert!(!ResignationStatus::Approved.can_transition_to(ResignationStatus::Withdrawn));
        assert!(ResignationStatus::Rejected.is_final());
    }

    #[test]
    fn notice_period_in_days() {
        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(notice_days(d("2026-03-01"), d("2026-03-31")), 30);
        assert_eq!(notice_days(d("2026-03-01"), d("2026-03-01")), 0);
    }
}
