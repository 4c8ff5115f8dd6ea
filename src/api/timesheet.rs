use crate::{
    api::{Paginated, ReasonBody, TimesheetListResponse},
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::timesheet::Timesheet,
    service::timesheet::{self as timesheet_service, CreateTimesheet, RangeQuery, TimesheetQuery, TimesheetTotals},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkApprove {
    #[schema(example = json!([4, 5, 6]))]
    pub ids: Vec<u64>,
}

#[utoipa::path(
    post,
    path = "/api/timesheets",
    request_body = CreateTimesheet,
    responses(
        (status = 201, body = Timesheet),
        (status = 409, description = "Timesheet already exists for that date")
    ),
    tag = "Timesheet",
    security(("bearer_auth" = []))
)]
pub async fn create_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateTimesheet>,
) -> actix_web::Result<impl Responder> {
    auth.require_self_or_hr(payload.employee_id)?;

    let timesheet = timesheet_service::create(pool.get_ref(), &payload, config.regular_hours_limit).await?;
    Ok(HttpResponse::Created().json(timesheet))
}

#[utoipa::path(
    get,
    path = "/api/timesheets",
    params(TimesheetQuery),
    responses((status = 200, body = TimesheetListResponse)),
    tag = "Timesheet",
    security(("bearer_auth" = []))
)]
pub async fn list_timesheets(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TimesheetQuery>,
) -> actix_web::Result<impl Responder> {
    let (timesheets, page, total) = timesheet_service::list(pool.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(Paginated::new(timesheets, page, total)))
}

#[utoipa::path(
    get,
    path = "/api/timesheets/{timesheet_id}",
    params(("timesheet_id", Path, description = "Timesheet ID")),
    responses(
        (status = 200, body = Timesheet),
        (status = 404, description = "Timesheet not found")
    ),
    tag = "Timesheet",
    security(("bearer_auth" = []))
)]
pub async fn get_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let timesheet = timesheet_service::get(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(timesheet.employee_id)?;

    Ok(HttpResponse::Ok().json(timesheet))
}

#[utoipa::path(
    put,
    path = "/api/timesheets/{timesheet_id}/approve",
    params(("timesheet_id", Path, description = "Timesheet ID")),
    responses(
        (status = 200, body = Timesheet),
        (status = 422, description = "Timesheet is not pending")
    ),
    tag = "Timesheet",
    security(("bearer_auth" = []))
)]
pub async fn approve_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let timesheet = timesheet_service::approve(pool.get_ref(), path.into_inner(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(timesheet))
}

#[utoipa::path(
    put,
    path = "/api/timesheets/{timesheet_id}/reject",
    params(("timesheet_id", Path, description = "Timesheet ID")),
    request_body = ReasonBody,
    responses(
        (status = 200, body = Timesheet),
        (status = 422, description = "Timesheet is not pending")
    ),
    tag = "Timesheet",
    security(("bearer_auth" = []))
)]
pub async fn reject_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReasonBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let timesheet =
        timesheet_service::reject(pool.get_ref(), path.into_inner(), auth.user_id, &payload.reason).await?;
    Ok(HttpResponse::Ok().json(timesheet))
}

/// Bulk Approve
///
/// All or nothing: one sheet that is not pending rolls the whole batch back.
#[utoipa::path(
    post,
    path = "/api/timesheets/bulk-approve",
    request_body = BulkApprove,
    responses(
        (status = 200, body = Object, example = json!({ "approved": 3 })),
        (status = 422, description = "A timesheet in the batch is not pending")
    ),
    tag = "Timesheet",
    security(("bearer_auth" = []))
)]
pub async fn bulk_approve(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<BulkApprove>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    if payload.ids.is_empty() {
        return Err(AppError::bad_request("ids must not be empty").into());
    }

    let approved = timesheet_service::bulk_approve(pool.get_ref(), &payload.ids, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "approved": approved })))
}

#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}/timesheets/totals",
    params(("employee_id", Path, description = "Employee ID"), RangeQuery),
    responses((status = 200, description = "Approved hours in the range", body = TimesheetTotals)),
    tag = "Timesheet",
    security(("bearer_auth" = []))
)]
pub async fn timesheet_totals(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    range: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;
    if range.from > range.to {
        return Err(AppError::bad_request("from cannot be after to").into());
    }

    let totals = timesheet_service::totals(pool.get_ref(), employee_id, range.from, range.to).await?;
    Ok(HttpResponse::Ok().json(totals))
}
