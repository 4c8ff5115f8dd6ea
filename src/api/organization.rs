use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::{department::Department, designation::Designation},
    utils::db_utils::{DEPARTMENT_COLUMNS, DESIGNATION_COLUMNS, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "Operations")]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDesignation {
    #[schema(example = "Crane Operator")]
    pub name: String,
    pub department_id: Option<u64>,
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn require_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    Ok(name)
}

/// Employees still pointing at a department or designation.
async fn employees_referencing(pool: &MySqlPool, column: &str, id: u64) -> Result<i64, AppError> {
    let sql = format!(
        "SELECT COUNT(*) FROM employees WHERE {} = ? AND deleted_at IS NULL",
        column
    );
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(pool).await?;
    Ok(count)
}

async fn fetch_department(pool: &MySqlPool, id: u64) -> Result<Department, AppError> {
    sqlx::query_as::<_, Department>(
        "SELECT id, name, description, is_active, created_at FROM departments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Department not found"))
}

async fn fetch_designation(pool: &MySqlPool, id: u64) -> Result<Designation, AppError> {
    sqlx::query_as::<_, Designation>(
        "SELECT id, name, department_id, description, is_active, created_at FROM designations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Designation not found"))
}

#[utoipa::path(
    get,
    path = "/api/departments",
    responses((status = 200, body = [Department])),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn list_departments(_auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT id, name, description, is_active, created_at FROM departments ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    get,
    path = "/api/departments/{department_id}",
    params(("department_id", Path, description = "Department ID")),
    responses(
        (status = 200, body = Department),
        (status = 404, description = "Department not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn get_department(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let department = fetch_department(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(department))
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = CreateDepartment,
    responses(
        (status = 201, body = Department),
        (status = 409, description = "Name already taken")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let name = require_name(&payload.name)?;

    let id = sqlx::query("INSERT INTO departments (name, description, is_active) VALUES (?, ?, ?)")
        .bind(name)
        .bind(&payload.description)
        .bind(payload.is_active)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?
        .last_insert_id();

    info!(department_id = id, name, "Department created");
    let department = fetch_department(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(department))
}

#[utoipa::path(
    put,
    path = "/api/departments/{department_id}",
    params(("department_id", Path, description = "Department ID")),
    request_body = Object,
    responses(
        (status = 200, body = Department),
        (status = 404, description = "Department not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let update = build_update_sql(&DEPARTMENT_COLUMNS, &body, "id", id)?;
    if execute_update(pool.get_ref(), update).await.map_err(AppError::from)? == 0 {
        // MySQL reports zero rows when nothing changed, so tell the cases apart.
        fetch_department(pool.get_ref(), id).await?;
    }

    let department = fetch_department(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(department))
}

#[utoipa::path(
    delete,
    path = "/api/departments/{department_id}",
    params(("department_id", Path, description = "Department ID")),
    responses(
        (status = 200, body = Object, example = json!({ "message": "Successfully deleted" })),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Department still has employees")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    let in_use = employees_referencing(pool.get_ref(), "department_id", id).await?;
    if in_use > 0 {
        return Err(AppError::conflict(format!("Department is assigned to {} employee(s)", in_use)).into());
    }

    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Department not found").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/designations",
    responses((status = 200, body = [Designation])),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn list_designations(_auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let designations = sqlx::query_as::<_, Designation>(
        "SELECT id, name, department_id, description, is_active, created_at FROM designations ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(designations))
}

#[utoipa::path(
    get,
    path = "/api/designations/{designation_id}",
    params(("designation_id", Path, description = "Designation ID")),
    responses(
        (status = 200, body = Designation),
        (status = 404, description = "Designation not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn get_designation(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let designation = fetch_designation(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(designation))
}

#[utoipa::path(
    post,
    path = "/api/designations",
    request_body = CreateDesignation,
    responses(
        (status = 201, body = Designation),
        (status = 409, description = "Unknown department")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn create_designation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDesignation>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let name = require_name(&payload.name)?;

    let id = sqlx::query(
        "INSERT INTO designations (name, department_id, description, is_active) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(payload.department_id)
    .bind(&payload.description)
    .bind(payload.is_active)
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?
    .last_insert_id();

    info!(designation_id = id, name, "Designation created");
    let designation = fetch_designation(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(designation))
}

#[utoipa::path(
    put,
    path = "/api/designations/{designation_id}",
    params(("designation_id", Path, description = "Designation ID")),
    request_body = Object,
    responses(
        (status = 200, body = Designation),
        (status = 404, description = "Designation not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn update_designation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let update = build_update_sql(&DESIGNATION_COLUMNS, &body, "id", id)?;
    if execute_update(pool.get_ref(), update).await.map_err(AppError::from)? == 0 {
        fetch_designation(pool.get_ref(), id).await?;
    }

    let designation = fetch_designation(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(designation))
}

#[utoipa::path(
    delete,
    path = "/api/designations/{designation_id}",
    params(("designation_id", Path, description = "Designation ID")),
    responses(
        (status = 200, body = Object, example = json!({ "message": "Successfully deleted" })),
        (status = 404, description = "Designation not found"),
        (status = 409, description = "Designation still has employees")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn delete_designation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    let in_use = employees_referencing(pool.get_ref(), "designation_id", id).await?;
    if in_use > 0 {
        return Err(AppError::conflict(format!("Designation is assigned to {} employee(s)", in_use)).into());
    }

    let result = sqlx::query("DELETE FROM designations WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Designation not found").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(require_name("  Workshop ").unwrap(), "Workshop");
        assert!(require_name("   ").is_err());
    }

    #[test]
    fn department_payload_defaults_to_active() {
        let payload: CreateDepartment = serde_json::from_value(json!({ "name": "Logistics" })).unwrap();
        assert!(payload.is_active);
        assert!(payload.description.is_none());
    }
}
