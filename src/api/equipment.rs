use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::equipment::{Equipment, EquipmentStatus},
    service::depreciation::{self as depreciation_service, SetDepreciation, Valuation, ValuationQuery},
    utils::db_utils::{BindValues, EQUIPMENT_COLUMNS, Filters, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Local;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const EQUIPMENT_SELECT: &str = r#"
    SELECT id, name, code, category, serial_number, status, daily_rate, notes, created_at
    FROM equipment
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEquipment {
    #[schema(example = "Mobile Crane 50T")]
    pub name: String,
    #[schema(example = "EQ-CR-050")]
    pub code: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    #[serde(default)]
    #[schema(example = 1500.0)]
    pub daily_rate: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EquipmentQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    /// Matches name, code or serial number
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeEquipmentStatus {
    pub status: EquipmentStatus,
}

async fn fetch_equipment(pool: &MySqlPool, equipment_id: u64) -> Result<Equipment, AppError> {
    sqlx::query_as::<_, Equipment>(&format!("{} WHERE id = ?", EQUIPMENT_SELECT))
        .bind(equipment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Equipment not found"))
}

#[utoipa::path(
    post,
    path = "/api/equipment",
    request_body = CreateEquipment,
    responses(
        (status = 201, body = Equipment),
        (status = 409, description = "Code already in use")
    ),
    tag = "Equipment",
    security(("bearer_auth" = []))
)]
pub async fn create_equipment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEquipment>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    if payload.name.trim().is_empty() || payload.code.trim().is_empty() {
        return Err(AppError::bad_request("name and code are required").into());
    }
    if payload.daily_rate < 0.0 {
        return Err(AppError::bad_request("daily_rate must not be negative").into());
    }

    let id = sqlx::query(
        r#"
        INSERT INTO equipment (name, code, category, serial_number, status, daily_rate, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.code.trim())
    .bind(&payload.category)
    .bind(&payload.serial_number)
    .bind(EquipmentStatus::Available.as_ref())
    .bind(payload.daily_rate)
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?
    .last_insert_id();

    info!(equipment_id = id, code = %payload.code, "Equipment registered");
    let equipment = fetch_equipment(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(equipment))
}

#[utoipa::path(
    get,
    path = "/api/equipment",
    params(EquipmentQuery),
    responses((status = 200, body = [Equipment])),
    tag = "Equipment",
    security(("bearer_auth" = []))
)]
pub async fn list_equipment(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EquipmentQuery>,
) -> actix_web::Result<impl Responder> {
    let mut filters = Filters::new();
    filters.push_opt("status = ?", query.status.as_deref());
    filters.push_opt("category = ?", query.category.as_deref());
    filters.search(&["name", "code", "serial_number"], query.search.as_deref());

    let equipment = sqlx::query_as::<_, Equipment>(&format!(
        "{} {} ORDER BY name, id",
        EQUIPMENT_SELECT,
        filters.where_clause()
    ))
    .bind_values(filters.values())
    .fetch_all(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(equipment))
}

#[utoipa::path(
    get,
    path = "/api/equipment/{equipment_id}",
    params(("equipment_id", Path, description = "Equipment ID")),
    responses(
        (status = 200, body = Equipment),
        (status = 404, description = "Equipment not found")
    ),
    tag = "Equipment",
    security(("bearer_auth" = []))
)]
pub async fn get_equipment(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let equipment = fetch_equipment(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(equipment))
}

#[utoipa::path(
    put,
    path = "/api/equipment/{equipment_id}",
    params(("equipment_id", Path, description = "Equipment ID")),
    request_body = Object,
    responses(
        (status = 200, body = Equipment),
        (status = 404, description = "Equipment not found")
    ),
    tag = "Equipment",
    security(("bearer_auth" = []))
)]
pub async fn update_equipment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let equipment_id = path.into_inner();

    let update = build_update_sql(&EQUIPMENT_COLUMNS, &body, "id", equipment_id)?;
    execute_update(pool.get_ref(), update).await.map_err(AppError::from)?;

    let equipment = fetch_equipment(pool.get_ref(), equipment_id).await?;
    Ok(HttpResponse::Ok().json(equipment))
}

/// Change Equipment Status
///
/// Only retiring available equipment and returning retired equipment to service
/// are allowed here.
#[utoipa::path(
    put,
    path = "/api/equipment/{equipment_id}/status",
    params(("equipment_id", Path, description = "Equipment ID")),
    request_body = ChangeEquipmentStatus,
    responses(
        (status = 200, body = Equipment),
        (status = 422, description = "Status change not allowed")
    ),
    tag = "Equipment",
    security(("bearer_auth" = []))
)]
pub async fn change_equipment_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ChangeEquipmentStatus>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let equipment_id = path.into_inner();

    let current = fetch_equipment(pool.get_ref(), equipment_id).await?;
    let current_status: EquipmentStatus = current
        .status
        .parse()
        .map_err(|_| AppError::internal(format!("unknown equipment status '{}'", current.status)))?;

    if !current_status.allows_manual_change_to(payload.status) {
        return Err(AppError::unprocessable(format!(
            "Cannot move equipment from '{}' to '{}'",
            current_status, payload.status
        ))
        .into());
    }

    let result = sqlx::query("UPDATE equipment SET status = ? WHERE id = ? AND status = ?")
        .bind(payload.status.as_ref())
        .bind(equipment_id)
        .bind(current_status.as_ref())
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    if result.rows_affected() == 0 {
        return Err(AppError::conflict("Equipment status changed concurrently").into());
    }

    info!(equipment_id, from = %current_status, to = %payload.status, "Equipment status changed");
    let equipment = fetch_equipment(pool.get_ref(), equipment_id).await?;
    Ok(HttpResponse::Ok().json(equipment))
}

/// Delete Equipment
///
/// Equipment referenced by rentals or maintenance tasks cannot be deleted; retire it instead.
#[utoipa::path(
    delete,
    path = "/api/equipment/{equipment_id}",
    params(("equipment_id", Path, description = "Equipment ID")),
    responses(
        (status = 200, body = Object, example = json!({ "message": "Successfully deleted" })),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment has rental or maintenance history")
    ),
    tag = "Equipment",
    security(("bearer_auth" = []))
)]
pub async fn delete_equipment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let result = sqlx::query("DELETE FROM equipment WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Equipment not found").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/equipment/{equipment_id}/depreciation",
    params(("equipment_id", Path, description = "Equipment ID"), ValuationQuery),
    responses(
        (status = 200, body = Valuation),
        (status = 404, description = "Equipment has no depreciation plan")
    ),
    tag = "Equipment",
    security(("bearer_auth" = []))
)]
pub async fn get_depreciation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<ValuationQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let as_of = query.as_of.unwrap_or_else(|| Local::now().date_naive());
    let valuation = depreciation_service::get(pool.get_ref(), path.into_inner(), as_of).await?;
    Ok(HttpResponse::Ok().json(valuation))
}

/// Set Depreciation Plan
///
/// Replaces any earlier plan; the response values the equipment as of today.
#[utoipa::path(
    put,
    path = "/api/equipment/{equipment_id}/depreciation",
    params(("equipment_id", Path, description = "Equipment ID")),
    request_body = SetDepreciation,
    responses(
        (status = 200, body = Valuation),
        (status = 400, description = "Residual value above cost or useful life out of range"),
        (status = 404, description = "Equipment not found")
    ),
    tag = "Equipment",
    security(("bearer_auth" = []))
)]
pub async fn set_depreciation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SetDepreciation>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let valuation = depreciation_service::set(pool.get_ref(), path.into_inner(), &payload, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(valuation))
}
