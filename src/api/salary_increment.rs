use crate::{
    api::{DateRange, IncrementListResponse, Paginated},
    auth::auth::AuthUser,
    model::salary_increment::SalaryIncrement,
    service::salary_increment::{
        self as increment_service, CreateIncrement, IncrementQuery, IncrementStatistics, ProjectedCost,
    },
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectIncrement {
    pub reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/salary-increments",
    request_body = CreateIncrement,
    responses(
        (status = 201, body = SalaryIncrement),
        (status = 400, description = "Terms do not fit the increment type"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn create_increment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateIncrement>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let increment = increment_service::create(pool.get_ref(), &payload, auth.user_id).await?;
    Ok(HttpResponse::Created().json(increment))
}

#[utoipa::path(
    get,
    path = "/api/salary-increments",
    params(IncrementQuery),
    responses((status = 200, body = IncrementListResponse)),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn list_increments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<IncrementQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let (increments, page, total) = increment_service::list(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(Paginated::new(increments, page, total)))
}

#[utoipa::path(
    get,
    path = "/api/salary-increments/statistics",
    params(DateRange),
    responses((status = 200, body = IncrementStatistics)),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn increment_statistics(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    range: web::Query<DateRange>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let stats = increment_service::statistics(pool.get_ref(), range.from, range.to).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/api/salary-increments/projected-cost",
    responses((status = 200, description = "Annual cost of pending increments", body = ProjectedCost)),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn projected_cost(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let projection = increment_service::projected_annual_cost(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(projection))
}

/// Apply Due Increments
///
/// Applies every approved increment whose effective date has arrived. Failures are
/// logged and skipped.
#[utoipa::path(
    post,
    path = "/api/salary-increments/apply-due",
    responses(
        (status = 200, body = Object, example = json!({ "applied_count": 2, "applied": [] }))
    ),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn apply_due(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let applied = increment_service::apply_due(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "applied_count": applied.len(),
        "applied": applied
    })))
}

#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}/salary-history",
    params(("employee_id", Path, description = "Employee ID")),
    responses((status = 200, description = "Applied increments, newest first", body = [SalaryIncrement])),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn salary_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let history = increment_service::history(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

#[utoipa::path(
    get,
    path = "/api/salary-increments/{increment_id}",
    params(("increment_id", Path, description = "Increment ID")),
    responses(
        (status = 200, body = SalaryIncrement),
        (status = 404, description = "Increment not found")
    ),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn get_increment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let increment = increment_service::get(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(increment.employee_id)?;

    Ok(HttpResponse::Ok().json(increment))
}

/// Approve Increment
///
/// Increments already effective are applied to the employee right away.
#[utoipa::path(
    put,
    path = "/api/salary-increments/{increment_id}/approve",
    params(("increment_id", Path, description = "Increment ID")),
    responses(
        (status = 200, body = SalaryIncrement),
        (status = 422, description = "Increment is not pending")
    ),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn approve_increment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let increment = increment_service::approve(pool.get_ref(), path.into_inner(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(increment))
}

#[utoipa::path(
    put,
    path = "/api/salary-increments/{increment_id}/reject",
    params(("increment_id", Path, description = "Increment ID")),
    request_body = RejectIncrement,
    responses(
        (status = 200, body = SalaryIncrement),
        (status = 422, description = "Increment is not pending")
    ),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn reject_increment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: Option<web::Json<RejectIncrement>>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let input = payload.map(web::Json::into_inner).unwrap_or_default();
    let increment =
        increment_service::reject(pool.get_ref(), path.into_inner(), auth.user_id, input.reason.as_deref()).await?;
    Ok(HttpResponse::Ok().json(increment))
}

#[utoipa::path(
    put,
    path = "/api/salary-increments/{increment_id}/apply",
    params(("increment_id", Path, description = "Increment ID")),
    responses(
        (status = 200, body = SalaryIncrement),
        (status = 422, description = "Increment is not approved or not yet effective")
    ),
    tag = "Salary Increment",
    security(("bearer_auth" = []))
)]
pub async fn apply_increment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let increment = increment_service::apply(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(increment))
}
