use crate::error::{AppError, AppResult};
use crate::model::depreciation::{DepreciationMethod, DepreciationPlan, EquipmentDepreciation, ScheduleYear};
use crate::model::employee::round2;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetDepreciation {
    pub method: DepreciationMethod,
    #[schema(example = 250000.0)]
    pub initial_value: f64,
    #[serde(default)]
    #[schema(example = 25000.0)]
    pub residual_value: f64,
    #[schema(example = 10)]
    pub useful_life_years: u32,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ValuationQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub as_of: Option<NaiveDate>,
}

/// Stored plan with the book value it gives on `as_of`.
#[derive(Debug, Serialize, ToSchema)]
pub struct Valuation {
    pub depreciation: EquipmentDepreciation,
    #[schema(value_type = String, format = "date")]
    pub as_of: NaiveDate,
    pub current_value: f64,
    pub accumulated_depreciation: f64,
    pub fully_depreciated: bool,
    pub schedule: Vec<ScheduleYear>,
}

impl SetDepreciation {
    fn plan(&self) -> DepreciationPlan {
        DepreciationPlan {
            method: self.method,
            initial_value: self.initial_value,
            residual_value: self.residual_value,
            useful_life_years: self.useful_life_years,
            start_date: self.start_date,
        }
    }
}

fn stored_plan(row: &EquipmentDepreciation) -> AppResult<DepreciationPlan> {
    let method = row
        .method
        .parse::<DepreciationMethod>()
        .map_err(|_| AppError::internal(format!("unknown depreciation method '{}'", row.method)))?;
    Ok(DepreciationPlan {
        method,
        initial_value: row.initial_value,
        residual_value: row.residual_value,
        useful_life_years: row.useful_life_years,
        start_date: row.start_date,
    })
}

pub fn valuation(row: EquipmentDepreciation, as_of: NaiveDate) -> AppResult<Valuation> {
    let plan = stored_plan(&row)?;
    let current_value = plan.current_value(as_of);
    Ok(Valuation {
        as_of,
        current_value,
        accumulated_depreciation: round2(plan.initial_value - current_value),
        fully_depreciated: current_value <= plan.residual_value,
        schedule: plan.schedule(),
        depreciation: row,
    })
}

async fn fetch(pool: &MySqlPool, equipment_id: u64) -> AppResult<EquipmentDepreciation> {
    sqlx::query_as::<_, EquipmentDepreciation>(
        r#"
        SELECT id, equipment_id, method, initial_value, residual_value, useful_life_years, start_date,
               updated_by, updated_at
        FROM equipment_depreciations
        WHERE equipment_id = ?
        "#,
    )
    .bind(equipment_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Equipment has no depreciation plan"))
}

pub async fn get(pool: &MySqlPool, equipment_id: u64, as_of: NaiveDate) -> AppResult<Valuation> {
    valuation(fetch(pool, equipment_id).await?, as_of)
}

/// Creates or replaces the single depreciation plan of a piece of equipment.
pub async fn set(
    pool: &MySqlPool,
    equipment_id: u64,
    input: &SetDepreciation,
    user_id: u64,
) -> AppResult<Valuation> {
    input.plan().check().map_err(AppError::bad_request)?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM equipment WHERE id = ?")
        .bind(equipment_id)
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(AppError::not_found("Equipment not found"));
    }

    sqlx::query(
        r#"
        INSERT INTO equipment_depreciations
            (equipment_id, method, initial_value, residual_value, useful_life_years, start_date, updated_by)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            method = VALUES(method), initial_value = VALUES(initial_value), residual_value = VALUES(residual_value),
            useful_life_years = VALUES(useful_life_years), start_date = VALUES(start_date),
            updated_by = VALUES(updated_by), updated_at = NOW()
        "#,
    )
    .bind(equipment_id)
    .bind(input.method.as_ref())
    .bind(input.initial_value)
    .bind(input.residual_value)
    .bind(input.useful_life_years)
    .bind(input.start_date)
    .bind(user_id)
    .execute(pool)
    .await?;

    info!(equipment_id, method = %input.method, "Depreciation plan saved");
    get(pool, equipment_id, Local::now().date_naive()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn row(method: &str) -> EquipmentDepreciation {
        EquipmentDepreciation {
            id: 1,
            equipment_id: 7,
            method: method.to_string(),
            initial_value: 10000.0,
            residual_value: 1000.0,
            useful_life_years: 5,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            updated_by: Some(2),
            updated_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn valuation_reports_value_on_the_requested_day() {
        let v = valuation(row("straight_line"), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();
        assert_eq!(v.current_value, 10000.0);
        assert_eq!(v.accumulated_depreciation, 0.0);
        assert!(!v.fully_depreciated);
        assert_eq!(v.schedule.len(), 5);

        let v = valuation(row("straight_line"), NaiveDate::from_ymd_opt(2031, 1, 1).unwrap()).unwrap();
        assert_eq!(v.current_value, 1000.0);
        assert!(v.fully_depreciated);
    }

    #[test]
    fn unknown_stored_method_is_an_internal_error() {
        let err = valuation(row("units_of_production"), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn residual_above_cost_is_rejected() {
        let input: SetDepreciation = serde_json::from_value(serde_json::json!({
            "method": "sum_of_years",
            "initial_value": 5000.0,
            "residual_value": 6000.0,
            "useful_life_years": 4,
            "start_date": "2026-01-01"
        }))
        .unwrap();
        assert!(input.plan().check().is_err());
    }
}
