use crate::{
    auth::auth::AuthUser,
    model::assignment::EmployeeAssignment,
    service::assignment::{self as assignment_service, CreateAssignment},
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::{Value, json};
use sqlx::MySqlPool;

#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}/assignments",
    params(("employee_id", Path, description = "Employee ID")),
    responses((status = 200, description = "Assignments, newest start first", body = [EmployeeAssignment])),
    tag = "Assignment",
    security(("bearer_auth" = []))
)]
pub async fn list_assignments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let assignments = assignment_service::list_for_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(assignments))
}

/// Create Assignment
///
/// The new assignment becomes current when it starts last; pending timesheets are
/// generated for past days without one.
#[utoipa::path(
    post,
    path = "/api/employees/{employee_id}/assignments",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = CreateAssignment,
    responses(
        (status = 201, body = EmployeeAssignment),
        (status = 400, description = "Invalid dates or name"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Assignment",
    security(("bearer_auth" = []))
)]
pub async fn create_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateAssignment>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let assignment = assignment_service::create(
        pool.get_ref(),
        path.into_inner(),
        &payload,
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Created().json(assignment))
}

#[utoipa::path(
    get,
    path = "/api/assignments/{assignment_id}",
    params(("assignment_id", Path, description = "Assignment ID")),
    responses(
        (status = 200, body = EmployeeAssignment),
        (status = 404, description = "Assignment not found")
    ),
    tag = "Assignment",
    security(("bearer_auth" = []))
)]
pub async fn get_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let assignment = assignment_service::get(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(assignment.employee_id)?;

    Ok(HttpResponse::Ok().json(assignment))
}

#[utoipa::path(
    put,
    path = "/api/assignments/{assignment_id}",
    params(("assignment_id", Path, description = "Assignment ID")),
    request_body = Object,
    responses(
        (status = 200, body = EmployeeAssignment),
        (status = 404, description = "Assignment not found")
    ),
    tag = "Assignment",
    security(("bearer_auth" = []))
)]
pub async fn update_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let assignment = assignment_service::update(pool.get_ref(), path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(assignment))
}

/// Delete Assignment
///
/// Removes upcoming timesheets tied to the same project or rental.
#[utoipa::path(
    delete,
    path = "/api/assignments/{assignment_id}",
    params(("assignment_id", Path, description = "Assignment ID")),
    responses(
        (status = 200, body = Object, example = json!({
            "message": "Successfully deleted",
            "timesheets_removed": 3
        })),
        (status = 404, description = "Assignment not found")
    ),
    tag = "Assignment",
    security(("bearer_auth" = []))
)]
pub async fn delete_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let removed = assignment_service::delete(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted",
        "timesheets_removed": removed
    })))
}
