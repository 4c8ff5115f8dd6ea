use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Equipment {
    pub id: u64,
    #[schema(example = "Mobile Crane 50T")]
    pub name: String,
    #[schema(example = "EQ-CR-050")]
    pub code: String,
    #[schema(example = "crane", nullable = true)]
    pub category: Option<String>,
    #[schema(nullable = true)]
    pub serial_number: Option<String>,
    #[schema(example = "available")]
    pub status: String,
    #[schema(example = 1500.0)]
    pub daily_rate: f64,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EquipmentStatus {
    Available,
    Rented,
    Maintenance,
    Retired,
}

impl EquipmentStatus {
    /// Status changes a user may make directly. Rented and maintenance are driven by
    /// rentals and maintenance tasks.
    pub fn allows_manual_change_to(self, next: EquipmentStatus) -> bool {
        matches!(
            (self, next),
            (EquipmentStatus::Available, EquipmentStatus::Retired) | (EquipmentStatus::Retired, EquipmentStatus::Available)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_retirement_is_manual() {
        assert!(EquipmentStatus::Available.allows_manual_change_to(EquipmentStatus::Retired));
        assert!(EquipmentStatus::Retired.allows_manual_change_to(EquipmentStatus::Available));
        assert!(!EquipmentStatus::Rented.allows_manual_change_to(EquipmentStatus::Retired));
        assert!(!EquipmentStatus::Available.allows_manual_change_to(EquipmentStatus::Maintenance));
    }
}
