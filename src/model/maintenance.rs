use super::status::StatusFlow;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct MaintenanceTask {
    pub id: u64,
    pub equipment_id: u64,
    #[schema(example = "Replace hydraulic hoses")]
    pub title: String,
    #[schema(nullable = true)]
    pub description: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub scheduled_date: NaiveDate,
    #[schema(nullable = true)]
    pub technician_id: Option<u64>,
    pub status: String,
    pub cost: f64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub completed_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub completed_by: Option<u64>,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MaintenanceStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl StatusFlow for MaintenanceStatus {
    const RECORD: &'static str = "maintenance task";

    fn next_states(self) -> &'static [Self] {
        use MaintenanceStatus::*;
        match self {
            Pending => &[Assigned, InProgress, Cancelled],
            Assigned => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

impl MaintenanceTask {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        let open = self
            .status
            .parse::<MaintenanceStatus>()
            .map(|s| !s.is_final())
            .unwrap_or(false);
        open && self.scheduled_date < today
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_must_be_in_progress_before_completion() {
        assert!(!MaintenanceStatus::Pending.can_transition_to(MaintenanceStatus::Completed));
        assert!(MaintenanceStatus::InProgress.can_transition_to(MaintenanceStatus::Completed));
        assert!(MaintenanceStatus::Assigned.can_transition_to(MaintenanceStatus::Cancelled));
        assert_eq!(MaintenanceStatus::InProgress.to_string(), "in_progress");
    }
}
