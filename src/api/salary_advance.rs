use crate::{
    api::{AdvanceListResponse, DateRange, Paginated, ReasonBody},
    auth::auth::AuthUser,
    config::Config,
    model::salary_advance::SalaryAdvance,
    service::salary_advance::{
        self as advance_service, AdvanceQuery, AdvanceStatistics, ApproveAdvance, CreateAdvance, PayAdvance,
    },
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::Value;
use sqlx::MySqlPool;

/// Request Advance
///
/// Employees request for themselves; HR may pass `employee_id`.
#[utoipa::path(
    post,
    path = "/api/salary-advances",
    request_body = CreateAdvance,
    responses(
        (status = 201, body = SalaryAdvance),
        (status = 422, description = "Outstanding advances would exceed the allowed share of salary")
    ),
    tag = "Salary Advance",
    security(("bearer_auth" = []))
)]
pub async fn create_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateAdvance>,
) -> actix_web::Result<impl Responder> {
    let advance = advance_service::create(pool.get_ref(), &auth, &payload, config.advance_salary_ratio).await?;
    Ok(HttpResponse::Created().json(advance))
}

#[utoipa::path(
    get,
    path = "/api/salary-advances",
    params(AdvanceQuery),
    responses((status = 200, body = AdvanceListResponse)),
    tag = "Salary Advance",
    security(("bearer_auth" = []))
)]
pub async fn list_advances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AdvanceQuery>,
) -> actix_web::Result<impl Responder> {
    let (advances, page, total) = advance_service::list(pool.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(Paginated::new(advances, page, total)))
}

#[utoipa::path(
    get,
    path = "/api/salary-advances/statistics",
    params(DateRange),
    responses((status = 200, body = AdvanceStatistics)),
    tag = "Salary Advance",
    security(("bearer_auth" = []))
)]
pub async fn advance_statistics(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    range: web::Query<DateRange>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let stats = advance_service::statistics(pool.get_ref(), range.from, range.to).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/api/salary-advances/{advance_id}",
    params(("advance_id", Path, description = "Advance ID")),
    responses(
        (status = 200, body = SalaryAdvance),
        (status = 404, description = "Advance not found")
    ),
    tag = "Salary Advance",
    security(("bearer_auth" = []))
)]
pub async fn get_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let advance = advance_service::get(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(advance.employee_id)?;

    Ok(HttpResponse::Ok().json(advance))
}

#[utoipa::path(
    put,
    path = "/api/salary-advances/{advance_id}",
    params(("advance_id", Path, description = "Advance ID")),
    request_body = Object,
    responses(
        (status = 200, body = SalaryAdvance),
        (status = 422, description = "Only pending advances can be edited")
    ),
    tag = "Salary Advance",
    security(("bearer_auth" = []))
)]
pub async fn update_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    let advance_id = path.into_inner();
    let current = advance_service::get(pool.get_ref(), advance_id).await?;
    auth.require_self_or_hr(current.employee_id)?;

    let advance = advance_service::update(pool.get_ref(), advance_id, &body, config.advance_salary_ratio).await?;
    Ok(HttpResponse::Ok().json(advance))
}

#[utoipa::path(
    put,
    path = "/api/salary-advances/{advance_id}/approve",
    params(("advance_id", Path, description = "Advance ID")),
    request_body = ApproveAdvance,
    responses(
        (status = 200, body = SalaryAdvance),
        (status = 422, description = "Advance is not pending")
    ),
    tag = "Salary Advance",
    security(("bearer_auth" = []))
)]
pub async fn approve_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: Option<web::Json<ApproveAdvance>>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let input = payload.map(web::Json::into_inner).unwrap_or_default();
    let advance = advance_service::approve(pool.get_ref(), path.into_inner(), auth.user_id, &input).await?;
    Ok(HttpResponse::Ok().json(advance))
}

#[utoipa::path(
    put,
    path = "/api/salary-advances/{advance_id}/reject",
    params(("advance_id", Path, description = "Advance ID")),
    request_body = ReasonBody,
    responses(
        (status = 200, body = SalaryAdvance),
        (status = 422, description = "Advance can no longer be rejected")
    ),
    tag = "Salary Advance",
    security(("bearer_auth" = []))
)]
pub async fn reject_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReasonBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let advance = advance_service::reject(pool.get_ref(), path.into_inner(), auth.user_id, &payload.reason).await?;
    Ok(HttpResponse::Ok().json(advance))
}

/// Pay Advance
///
/// Disburses an approved advance; repayment starts with next month's payroll.
#[utoipa::path(
    put,
    path = "/api/salary-advances/{advance_id}/pay",
    params(("advance_id", Path, description = "Advance ID")),
    request_body = PayAdvance,
    responses(
        (status = 200, body = SalaryAdvance),
        (status = 422, description = "Advance is not approved")
    ),
    tag = "Salary Advance",
    security(("bearer_auth" = []))
)]
pub async fn pay_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<PayAdvance>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let advance = advance_service::pay(pool.get_ref(), path.into_inner(), &payload).await?;
    Ok(HttpResponse::Ok().json(advance))
}
