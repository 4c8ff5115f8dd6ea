use crate::error::{AppError, AppResult};
use crate::model::equipment::EquipmentStatus;
use crate::model::maintenance::{MaintenanceStatus, MaintenanceTask};
use crate::model::status::StatusFlow;
use crate::utils::db_utils::{BindValues, Filters, MAINTENANCE_COLUMNS, build_update_sql, execute_update};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const TASK_SELECT: &str = r#"
    SELECT id, equipment_id, title, description, scheduled_date, technician_id, status, cost,
           completed_at, completed_by, notes, created_at
    FROM maintenance_tasks
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTask {
    pub equipment_id: u64,
    #[schema(example = "Replace hydraulic hoses")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "2026-05-04", format = "date", value_type = String)]
    pub scheduled_date: NaiveDate,
    /// Assigns the task straight away
    pub technician_id: Option<u64>,
    #[serde(default)]
    pub cost: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteTask {
    pub cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskQuery {
    pub equipment_id: Option<u64>,
    pub status: Option<String>,
    #[serde(default)]
    pub overdue: bool,
}

pub async fn get(pool: &MySqlPool, task_id: u64) -> AppResult<MaintenanceTask> {
    sqlx::query_as::<_, MaintenanceTask>(&format!("{} WHERE id = ?", TASK_SELECT))
        .bind(task_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Maintenance task not found"))
}

async fn lock(tx: &mut Transaction<'_, MySql>, task_id: u64) -> AppResult<MaintenanceTask> {
    sqlx::query_as::<_, MaintenanceTask>(&format!("{} WHERE id = ? FOR UPDATE", TASK_SELECT))
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Maintenance task not found"))
}

async fn set_equipment_status(
    tx: &mut Transaction<'_, MySql>,
    equipment_id: u64,
    status: EquipmentStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE equipment SET status = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(equipment_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn create(pool: &MySqlPool, input: &CreateTask) -> AppResult<MaintenanceTask> {
    if input.title.trim().is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    if input.cost < 0.0 {
        return Err(AppError::bad_request("cost must not be negative"));
    }

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM equipment WHERE id = ?")
        .bind(input.equipment_id)
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(AppError::not_found("Equipment not found"));
    }

    let status = if input.technician_id.is_some() {
        MaintenanceStatus::Assigned
    } else {
        MaintenanceStatus::Pending
    };

    let task_id = sqlx::query(
        r#"
        INSERT INTO maintenance_tasks
            (equipment_id, title, description, scheduled_date, technician_id, status, cost, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.equipment_id)
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(input.scheduled_date)
    .bind(input.technician_id)
    .bind(status.as_ref())
    .bind(input.cost)
    .bind(&input.notes)
    .execute(pool)
    .await?
    .last_insert_id();

    info!(task_id, equipment_id = input.equipment_id, "Maintenance task scheduled");
    get(pool, task_id).await
}

pub async fn update(pool: &MySqlPool, task_id: u64, payload: &Value) -> AppResult<MaintenanceTask> {
    let current = get(pool, task_id).await?;
    if MaintenanceStatus::parse_stored(&current.status)?.is_final() {
        return Err(AppError::unprocessable("Closed maintenance tasks cannot be edited"));
    }

    let update = build_update_sql(&MAINTENANCE_COLUMNS, payload, "id", task_id)?;
    execute_update(pool, update).await?;

    info!(task_id, "Maintenance task updated");
    get(pool, task_id).await
}

pub async fn assign(pool: &MySqlPool, task_id: u64, technician_id: u64) -> AppResult<MaintenanceTask> {
    let current = get(pool, task_id).await?;
    MaintenanceStatus::ensure_transition(&current.status, MaintenanceStatus::Assigned)?;

    sqlx::query("UPDATE maintenance_tasks SET status = ?, technician_id = ? WHERE id = ? AND status = ?")
        .bind(MaintenanceStatus::Assigned.as_ref())
        .bind(technician_id)
        .bind(task_id)
        .bind(&current.status)
        .execute(pool)
        .await?;

    info!(task_id, technician_id, "Maintenance task assigned");
    get(pool, task_id).await
}

/// Starting work takes the equipment out of service; rented equipment cannot be serviced.
pub async fn start(pool: &MySqlPool, task_id: u64) -> AppResult<MaintenanceTask> {
    let mut tx = pool.begin().await?;
    let task = lock(&mut tx, task_id).await?;
    MaintenanceStatus::ensure_transition(&task.status, MaintenanceStatus::InProgress)?;

    let equipment_status: Option<String> = sqlx::query_scalar("SELECT status FROM equipment WHERE id = ? FOR UPDATE")
        .bind(task.equipment_id)
        .fetch_optional(&mut *tx)
        .await?;
    match equipment_status.as_deref() {
        None => return Err(AppError::not_found("Equipment not found")),
        Some(s) if s == EquipmentStatus::Rented.as_ref() => {
            return Err(AppError::conflict("Equipment is out on rental"));
        }
        Some(_) => {}
    }

    sqlx::query("UPDATE maintenance_tasks SET status = ? WHERE id = ?")
        .bind(MaintenanceStatus::InProgress.as_ref())
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    set_equipment_status(&mut tx, task.equipment_id, EquipmentStatus::Maintenance).await?;

    tx.commit().await?;
    info!(task_id, equipment_id = task.equipment_id, "Maintenance started");
    get(pool, task_id).await
}

pub async fn complete(pool: &MySqlPool, task_id: u64, completed_by: u64, input: &CompleteTask) -> AppResult<MaintenanceTask> {
    if input.cost.is_some_and(|c| c < 0.0) {
        return Err(AppError::bad_request("cost must not be negative"));
    }

    let mut tx = pool.begin().await?;
    let task = lock(&mut tx, task_id).await?;
    MaintenanceStatus::ensure_transition(&task.status, MaintenanceStatus::Completed)?;

    sqlx::query(
        r#"
        UPDATE maintenance_tasks
        SET status = ?, completed_at = NOW(), completed_by = ?, cost = ?, notes = COALESCE(?, notes)
        WHERE id = ?
        "#,
    )
    .bind(MaintenanceStatus::Completed.as_ref())
    .bind(completed_by)
    .bind(input.cost.unwrap_or(task.cost))
    .bind(&input.notes)
    .bind(task_id)
    .execute(&mut *tx)
    .await?;
    release_equipment(&mut tx, task.equipment_id).await?;

    tx.commit().await?;
    info!(task_id, equipment_id = task.equipment_id, "Maintenance completed");
    get(pool, task_id).await
}

pub async fn cancel(pool: &MySqlPool, task_id: u64) -> AppResult<MaintenanceTask> {
    let mut tx = pool.begin().await?;
    let task = lock(&mut tx, task_id).await?;
    let was = MaintenanceStatus::ensure_transition(&task.status, MaintenanceStatus::Cancelled)?;

    sqlx::query("UPDATE maintenance_tasks SET status = ? WHERE id = ?")
        .bind(MaintenanceStatus::Cancelled.as_ref())
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    if was == MaintenanceStatus::InProgress {
        release_equipment(&mut tx, task.equipment_id).await?;
    }

    tx.commit().await?;
    info!(task_id, "Maintenance cancelled");
    get(pool, task_id).await
}

/// Back to `available`, unless another task still has the equipment in the shop.
async fn release_equipment(tx: &mut Transaction<'_, MySql>, equipment_id: u64) -> Result<(), sqlx::Error> {
    let still_open = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM maintenance_tasks WHERE equipment_id = ? AND status = ?",
    )
    .bind(equipment_id)
    .bind(MaintenanceStatus::InProgress.as_ref())
    .fetch_one(&mut **tx)
    .await?;

    if still_open == 0 {
        sqlx::query("UPDATE equipment SET status = ? WHERE id = ? AND status = ?")
            .bind(EquipmentStatus::Available.as_ref())
            .bind(equipment_id)
            .bind(EquipmentStatus::Maintenance.as_ref())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub async fn list(pool: &MySqlPool, query: &TaskQuery) -> AppResult<Vec<MaintenanceTask>> {
    let mut filters = Filters::new();
    filters.push_opt("equipment_id = ?", query.equipment_id);
    filters.push_opt("status = ?", query.status.as_deref());

    let rows = sqlx::query_as::<_, MaintenanceTask>(&format!(
        "{} {} ORDER BY scheduled_date, id",
        TASK_SELECT,
        filters.where_clause()
    ))
    .bind_values(filters.values())
    .fetch_all(pool)
    .await?;

    if !query.overdue {
        return Ok(rows);
    }
    let today = Local::now().date_naive();
    Ok(rows.into_iter().filter(|t| t.is_overdue(today)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_payload_cost_defaults_to_zero() {
        let input: CreateTask = serde_json::from_value(serde_json::json!({
            "equipment_id": 1,
            "title": "Oil change",
            "scheduled_date": "2026-05-04"
        }))
        .unwrap();
        assert_eq!(input.cost, 0.0);
        assert!(input.technician_id.is_none());
    }
}
