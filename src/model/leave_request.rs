use super::status::StatusFlow;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(nullable = true)]
    pub reason: Option<String>,
    #[schema(nullable = true)]
    pub reviewed_by: Option<u64>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Unpaid,
    Emergency,
    Maternity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl StatusFlow for LeaveStatus {
    const RECORD: &'static str = "leave request";

    fn next_states(self) -> &'static [Self] {
        match self {
            LeaveStatus::Pending => &[LeaveStatus::Approved, LeaveStatus::Rejected, LeaveStatus::Cancelled],
            LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Cancelled => &[],
        }
    }
}

/// Inclusive number of calendar days covered by a leave.
pub fn leave_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_leave_moves() {
        assert!(LeaveStatus::Pending.can_transition_to(LeaveStatus::Approved));
        assert!(LeaveStatus::Pending.can_transition_to(LeaveStatus::Cancelled));
        assert!(!LeaveStatus::Approved.can_transition_to(LeaveStatus::Rejected));
        assert!(LeaveStatus::Rejected.is_final());
    }

    #[test]
    fn ensure_transition_reports_illegal_move() {
        let err = LeaveStatus::ensure_transition("approved", LeaveStatus::Cancelled).unwrap_err();
        assert!(err.to_string().contains("approved"));
        assert!(LeaveStatus::ensure_transition("pending", LeaveStatus::Rejected).is_ok());
    }

    #[test]
    fn leave_days_is_inclusive() {
        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(leave_days(d("2026-01-01"), d("2026-01-01")), 1);
        assert_eq!(leave_days(d("2026-01-30"), d("2026-02-02")), 4);
    }
}
