use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeAssignment {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "project")]
    pub assignment_type: String,
    pub name: String,
    #[schema(nullable = true)]
    pub location: Option<String>,
    #[schema(example = "active")]
    pub status: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(nullable = true)]
    pub assigned_by: Option<u64>,
    #[schema(nullable = true)]
    pub project_id: Option<u64>,
    #[schema(nullable = true)]
    pub rental_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssignmentType {
    Project,
    Rental,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Active,
    Completed,
}

/// The columns the normalizer looks at.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AssignmentSlot {
    pub id: u64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotUpdate {
    pub id: u64,
    pub status: AssignmentStatus,
    pub end_date: Option<NaiveDate>,
}

/// Works out which of an employee's assignments need their status rewritten.
///
/// The assignment with the latest start date (ties broken by the highest id) is the
/// current one: active and open ended. Every other assignment is completed and ends
/// the day before the current one starts.
pub fn plan_normalization(slots: &[AssignmentSlot]) -> Vec<SlotUpdate> {
    let current = match slots.iter().max_by_key(|s| (s.start_date, s.id)) {
        Some(c) => c,
        None => return Vec::new(),
    };
    let closing_date = current.start_date - Duration::days(1);

    let active = AssignmentStatus::Active.as_ref();
    let completed = AssignmentStatus::Completed.as_ref();

    slots
        .iter()
        .filter_map(|slot| {
            if slot.id == current.id {
                (slot.status != active || slot.end_date.is_some()).then(|| SlotUpdate {
                    id: slot.id,
                    status: AssignmentStatus::Active,
                    end_date: None,
                })
            } else {
                (slot.status != completed || slot.end_date.is_none()).then(|| SlotUpdate {
                    id: slot.id,
                    status: AssignmentStatus::Completed,
                    end_date: Some(closing_date),
                })
            }
        })
        .collect()
}

/// Days an assignment should have timesheets for: start through the earlier of its
/// end date and today.
pub fn timesheet_dates(start: NaiveDate, end: Option<NaiveDate>, today: NaiveDate) -> Vec<NaiveDate> {
    let last = end.map_or(today, |e| e.min(today));
    start.iter_days().take_while(|d| *d <= last).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn slot(id: u64, start: &str, end: Option<&str>, status: &str) -> AssignmentSlot {
        AssignmentSlot {
            id,
            start_date: d(start),
            end_date: end.map(d),
            status: status.to_string(),
        }
    }

    #[test]
    fn latest_assignment_becomes_active_and_others_close() {
        let slots = vec![
            slot(1, "2026-01-01", None, "active"),
            slot(2, "2026-03-10", Some("2026-04-01"), "pending"),
        ];

        let updates = plan_normalization(&slots);

        assert_eq!(
            updates,
            vec![
                SlotUpdate { id: 1, status: AssignmentStatus::Completed, end_date: Some(d("2026-03-09")) },
                SlotUpdate { id: 2, status: AssignmentStatus::Active, end_date: None },
            ]
        );
    }

    #[test]
    fn already_normalized_assignments_are_left_alone() {
        let slots = vec![
            slot(1, "2026-01-01", Some("2026-02-28"), "completed"),
            slot(2, "2026-03-01", None, "active"),
        ];
        assert!(plan_normalization(&slots).is_empty());
    }

    #[test]
    fn same_start_date_prefers_newest_record() {
        let slots = vec![
            slot(4, "2026-05-01", None, "active"),
            slot(7, "2026-05-01", None, "pending"),
        ];

        let updates = plan_normalization(&slots);
        assert!(updates.contains(&SlotUpdate { id: 7, status: AssignmentStatus::Active, end_date: None }));
        assert!(updates.contains(&SlotUpdate {
            id: 4,
            status: AssignmentStatus::Completed,
            end_date: Some(d("2026-04-30")),
        }));
    }

    #[test]
    fn timesheet_dates_stop_at_today_or_end() {
        let today = d("2026-03-05");
        assert_eq!(timesheet_dates(d("2026-03-03"), None, today).len(), 3);
        assert_eq!(
            timesheet_dates(d("2026-03-01"), Some(d("2026-03-02")), today),
            vec![d("2026-03-01"), d("2026-03-02")]
        );
        assert!(timesheet_dates(d("2026-04-01"), None, today).is_empty());
    }
}
