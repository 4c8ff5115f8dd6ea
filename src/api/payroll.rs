use actix_web::{HttpResponse, Responder, web};
use sqlx::MySqlPool;

use crate::{
    api::{Paginated, PayrollListResponse},
    auth::auth::AuthUser,
    model::payroll::Payroll,
    service::payroll::{self as payroll_service, CreatePayroll, GeneratePayroll, GeneratedPayroll, PayrollQuery, UpdatePayroll},
};

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created", body = Payroll),
        (status = 409, description = "Payroll already exists for that month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payroll = payroll_service::create(pool.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(payroll))
}

/// Generate Payroll
///
/// Builds the month's payroll from the salary components, approved overtime,
/// absent days and due advance installments.
#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = GeneratePayroll,
    responses(
        (status = 201, description = "Payroll generated", body = GeneratedPayroll),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Payroll already exists for that month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GeneratePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let generated = payroll_service::generate(pool.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(generated))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    request_body = UpdatePayroll,
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll updated", body = Payroll),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payroll = payroll_service::update(pool.get_ref(), path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, body = Payroll),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let payroll = payroll_service::get(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(payroll.employee_id)?;

    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses((status = 200, body = PayrollListResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    let (payrolls, page, total) = payroll_service::list(pool.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(Paginated::new(payrolls, page, total)))
}
