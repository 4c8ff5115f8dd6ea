use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    service::settings::{self as settings_service, ExportedSetting, GroupedSettings, HealthReport, HealthStatus, ImportSummary},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportSettings {
    pub settings: Vec<ExportedSetting>,
    #[serde(default)]
    pub overwrite_existing: bool,
}

/// All settings grouped by category, values cast to their stored type.
#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, body = Object, example = json!({
            "general": { "app_name": "SND Rental Management", "decimal_places": 2 },
            "security": { "password_min_length": 8 }
        }))
    ),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn all_settings(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let settings = settings_service::get_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[utoipa::path(
    get,
    path = "/api/settings/public",
    responses((status = 200, description = "Settings flagged public", body = Object)),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn public_settings(_auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let settings = settings_service::get_public(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[utoipa::path(
    get,
    path = "/api/settings/{key}",
    params(("key", Path, description = "Setting key, e.g. currency")),
    responses(
        (status = 200, body = Object, example = json!({ "key": "currency", "value": "USD" })),
        (status = 404, description = "Unknown setting")
    ),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn get_setting(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let key = path.into_inner();

    let value = settings_service::get_setting(pool.get_ref(), &key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Setting '{}' not found", key)))?;
    Ok(HttpResponse::Ok().json(json!({ "key": key, "value": value })))
}

/// Update Settings
///
/// Body is `{category: {key: value}}`. Unknown keys are created with a type inferred
/// from the JSON value; existing keys keep their stored type.
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body(content = Object, example = json!({ "general": { "currency": "SAR" } })),
    responses(
        (status = 200, body = Object, example = json!({ "message": "Settings updated", "updated": 1 })),
        (status = 400, description = "No settings or an empty key"),
        (status = 422, description = "Value of the wrong type or out of range")
    ),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GroupedSettings>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let updated = settings_service::update_settings(pool.get_ref(), &payload).await?;
    info!(updated, user_id = auth.user_id, "Settings updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Settings updated", "updated": updated })))
}

#[utoipa::path(
    post,
    path = "/api/settings/reset",
    responses((status = 200, body = Object, example = json!({ "message": "Settings reset to defaults", "count": 40 }))),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn reset_settings(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let count = settings_service::reset_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Settings reset to defaults", "count": count })))
}

#[utoipa::path(
    post,
    path = "/api/settings/reset/{category}",
    params(("category", Path, description = "general, security, performance, notifications or maintenance")),
    responses(
        (status = 200, body = Object, example = json!({ "message": "Category reset to defaults", "count": 8 })),
        (status = 404, description = "Unknown category")
    ),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn reset_category(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let count = settings_service::reset_category(pool.get_ref(), &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Category reset to defaults", "count": count })))
}

#[utoipa::path(
    get,
    path = "/api/settings/export",
    responses((status = 200, body = [ExportedSetting])),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn export_settings(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let exported = settings_service::export_settings(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(exported))
}

#[utoipa::path(
    post,
    path = "/api/settings/import",
    request_body = ImportSettings,
    responses(
        (status = 200, body = ImportSummary),
        (status = 400, description = "Unknown setting type")
    ),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn import_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ImportSettings>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let summary =
        settings_service::import_settings(pool.get_ref(), &payload.settings, payload.overwrite_existing).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// System Health
///
/// Responds 503 when any check is unhealthy.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, body = HealthReport),
        (status = 503, body = HealthReport)
    ),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn system_health(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let report = settings_service::system_health(pool.get_ref(), &config.log_dir).await;
    let response = if report.overall_status == HealthStatus::Unhealthy {
        HttpResponse::ServiceUnavailable().json(report)
    } else {
        HttpResponse::Ok().json(report)
    };
    Ok(response)
}
