use super::employee::round2;
use super::status::StatusFlow;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Timesheet {
    pub id: u64,
    pub employee_id: u64,
    #[schema(nullable = true)]
    pub assignment_id: Option<u64>,
    #[schema(nullable = true)]
    pub project_id: Option<u64>,
    #[schema(nullable = true)]
    pub rental_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "07:00:00")]
    pub clock_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:30:00")]
    pub clock_out: Option<NaiveTime>,
    pub break_minutes: u32,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub total_hours: f64,
    pub status: String,
    #[schema(nullable = true)]
    pub approved_by: Option<u64>,
    #[schema(nullable = true)]
    pub rejection_reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimesheetStatus {
    Pending,
    Approved,
    Rejected,
}

impl StatusFlow for TimesheetStatus {
    const RECORD: &'static str = "timesheet";

    fn next_states(self) -> &'static [Self] {
        match self {
            TimesheetStatus::Pending => &[TimesheetStatus::Approved, TimesheetStatus::Rejected],
            TimesheetStatus::Approved | TimesheetStatus::Rejected => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct WorkedHours {
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub total_hours: f64,
}

impl WorkedHours {
    /// Splits a day's worked time into regular and overtime hours.
    pub fn split(total_hours: f64, regular_limit: f64) -> Self {
        let total = total_hours.max(0.0);
        let regular = total.min(regular_limit);
        let overtime = (total - regular_limit).max(0.0);

        Self {
            regular_hours: round2(regular),
            overtime_hours: round2(overtime),
            total_hours: round2(total),
        }
    }

    /// A full contract day: every hour is regular, none is overtime.
    pub fn contract_day(hours_per_day: f64) -> Self {
        let hours = round2(hours_per_day.max(0.0));
        Self {
            regular_hours: hours,
            overtime_hours: 0.0,
            total_hours: hours,
        }
    }

    /// Hours between clock in and clock out minus the break.
    ///
    /// A clock out earlier than the clock in is treated as an overnight shift.
    pub fn from_clock(clock_in: NaiveTime, clock_out: NaiveTime, break_minutes: u32, regular_limit: f64) -> Self {
        let mut minutes = (clock_out - clock_in).num_minutes();
        if minutes < 0 {
            minutes += 24 * 60;
        }
        let worked = (minutes - break_minutes as i64).max(0) as f64 / 60.0;
        Self::split(worked, regular_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn overtime_starts_after_regular_limit() {
        let h = WorkedHours::from_clock(t("07:00"), t("18:00"), 60, 8.0);
        assert_eq!(h.total_hours, 10.0);
        assert_eq!(h.regular_hours, 8.0);
        assert_eq!(h.overtime_hours, 2.0);
    }

    #[test]
    fn short_day_has_no_overtime() {
        let h = WorkedHours::from_clock(t("09:00"), t("13:20"), 0, 8.0);
        assert_eq!(h.total_hours, 4.33);
        assert_eq!(h.overtime_hours, 0.0);
    }

    #[test]
    fn overnight_shift_wraps_midnight() {
        let h = WorkedHours::from_clock(t("22:00"), t("06:00"), 30, 8.0);
        assert_eq!(h.total_hours, 7.5);
    }

    #[test]
    fn break_longer_than_shift_yields_zero() {
        let h = WorkedHours::from_clock(t("09:00"), t("09:30"), 45, 8.0);
        assert_eq!(h.total_hours, 0.0);
    }

    #[test]
    fn contract_day_has_no_overtime_whatever_its_length() {
        let long = WorkedHours::contract_day(10.0);
        assert_eq!(long.regular_hours, 10.0);
        assert_eq!(long.overtime_hours, 0.0);
        assert_eq!(long.total_hours, 10.0);

        assert_eq!(WorkedHours::contract_day(6.0).regular_hours, 6.0);
    }

    #[test]
    fn reviewed_sheets_are_final() {
        assert!(TimesheetStatus::Approved.is_final());
        assert!(!TimesheetStatus::Rejected.can_transition_to(TimesheetStatus::Approved));
    }
}
