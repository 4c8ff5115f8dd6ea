use crate::{
    auth::auth::AuthUser,
    model::maintenance::MaintenanceTask,
    service::maintenance::{self as maintenance_service, CompleteTask, CreateTask, TaskQuery},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTechnician {
    #[schema(example = 12)]
    pub technician_id: u64,
}

#[utoipa::path(
    post,
    path = "/api/maintenance",
    request_body = CreateTask,
    responses(
        (status = 201, body = MaintenanceTask),
        (status = 404, description = "Equipment not found")
    ),
    tag = "Maintenance",
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTask>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let task = maintenance_service::create(pool.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(task))
}

#[utoipa::path(
    get,
    path = "/api/maintenance",
    params(TaskQuery),
    responses((status = 200, body = [MaintenanceTask])),
    tag = "Maintenance",
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TaskQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let tasks = maintenance_service::list(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[utoipa::path(
    get,
    path = "/api/maintenance/{task_id}",
    params(("task_id", Path, description = "Maintenance task ID")),
    responses(
        (status = 200, body = MaintenanceTask),
        (status = 404, description = "Task not found")
    ),
    tag = "Maintenance",
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let task = maintenance_service::get(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}

#[utoipa::path(
    put,
    path = "/api/maintenance/{task_id}",
    params(("task_id", Path, description = "Maintenance task ID")),
    request_body = Object,
    responses(
        (status = 200, body = MaintenanceTask),
        (status = 422, description = "Task already finished")
    ),
    tag = "Maintenance",
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let task = maintenance_service::update(pool.get_ref(), path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(task))
}

#[utoipa::path(
    put,
    path = "/api/maintenance/{task_id}/assign",
    params(("task_id", Path, description = "Maintenance task ID")),
    request_body = AssignTechnician,
    responses(
        (status = 200, body = MaintenanceTask),
        (status = 422, description = "Task is not pending")
    ),
    tag = "Maintenance",
    security(("bearer_auth" = []))
)]
pub async fn assign_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AssignTechnician>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let task = maintenance_service::assign(pool.get_ref(), path.into_inner(), payload.technician_id).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Start Task
///
/// Puts the equipment into maintenance; refused while it is rented out.
#[utoipa::path(
    put,
    path = "/api/maintenance/{task_id}/start",
    params(("task_id", Path, description = "Maintenance task ID")),
    responses(
        (status = 200, body = MaintenanceTask),
        (status = 409, description = "Equipment is rented"),
        (status = 422, description = "Task cannot start from its current status")
    ),
    tag = "Maintenance",
    security(("bearer_auth" = []))
)]
pub async fn start_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let task = maintenance_service::start(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}

#[utoipa::path(
    put,
    path = "/api/maintenance/{task_id}/complete",
    params(("task_id", Path, description = "Maintenance task ID")),
    request_body = CompleteTask,
    responses(
        (status = 200, body = MaintenanceTask),
        (status = 422, description = "Task is not in progress")
    ),
    tag = "Maintenance",
    security(("bearer_auth" = []))
)]
pub async fn complete_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: Option<web::Json<CompleteTask>>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let input = payload.map(web::Json::into_inner).unwrap_or_default();
    let task = maintenance_service::complete(pool.get_ref(), path.into_inner(), auth.user_id, &input).await?;
    Ok(HttpResponse::Ok().json(task))
}

#[utoipa::path(
    put,
    path = "/api/maintenance/{task_id}/cancel",
    params(("task_id", Path, description = "Maintenance task ID")),
    responses(
        (status = 200, body = MaintenanceTask),
        (status = 422, description = "Task already finished")
    ),
    tag = "Maintenance",
    security(("bearer_auth" = []))
)]
pub async fn cancel_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let task = maintenance_service::cancel(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}
