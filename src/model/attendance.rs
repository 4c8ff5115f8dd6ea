use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "08:02:11")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:04:52")]
    pub check_out: Option<NaiveTime>,
}

impl Attendance {
    /// Hours between check in and check out; `None` while the day is still open.
    pub fn worked_hours(&self) -> Option<f64> {
        let (start, end) = (self.check_in?, self.check_out?);
        let minutes = (end - start).num_minutes().max(0);
        Some(super::employee::round2(minutes as f64 / 60.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(check_in: Option<&str>, check_out: Option<&str>) -> Attendance {
        let t = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").unwrap();
        Attendance {
            id: 1,
            employee_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            check_in: check_in.map(t),
            check_out: check_out.map(t),
        }
    }

    #[test]
    fn open_day_has_no_hours() {
        assert_eq!(record(Some("08:00"), None).worked_hours(), None);
    }

    #[test]
    fn closed_day_reports_hours() {
        assert_eq!(record(Some("08:00"), Some("16:30")).worked_hours(), Some(8.5));
    }
}
