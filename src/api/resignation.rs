use crate::{
    api::ReasonBody,
    auth::auth::AuthUser,
    model::resignation::Resignation,
    service::resignation::{self as resignation_service, ResignationQuery, SubmitResignation},
};
use actix_web::{HttpResponse, Responder, web};
use sqlx::MySqlPool;

#[utoipa::path(
    post,
    path = "/api/resignations",
    request_body = SubmitResignation,
    responses(
        (status = 201, body = Resignation),
        (status = 400, description = "Last working day before resignation date"),
        (status = 409, description = "Employee already has an open resignation")
    ),
    tag = "Resignation",
    security(("bearer_auth" = []))
)]
pub async fn submit_resignation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SubmitResignation>,
) -> actix_web::Result<impl Responder> {
    let resignation = resignation_service::submit(pool.get_ref(), &auth, &payload).await?;
    Ok(HttpResponse::Created().json(resignation))
}

#[utoipa::path(
    get,
    path = "/api/resignations",
    params(ResignationQuery),
    responses((status = 200, body = [Resignation])),
    tag = "Resignation",
    security(("bearer_auth" = []))
)]
pub async fn list_resignations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ResignationQuery>,
) -> actix_web::Result<impl Responder> {
    let resignations = resignation_service::list(pool.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(resignations))
}

#[utoipa::path(
    get,
    path = "/api/resignations/{resignation_id}",
    params(("resignation_id", Path, description = "Resignation ID")),
    responses(
        (status = 200, body = Resignation),
        (status = 404, description = "Resignation not found")
    ),
    tag = "Resignation",
    security(("bearer_auth" = []))
)]
pub async fn get_resignation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let resignation = resignation_service::get(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(resignation.employee_id)?;

    Ok(HttpResponse::Ok().json(resignation))
}

/// Approve Resignation
///
/// Marks the employee as resigned and calculates their final settlement.
#[utoipa::path(
    put,
    path = "/api/resignations/{resignation_id}/approve",
    params(("resignation_id", Path, description = "Resignation ID")),
    responses(
        (status = 200, body = Resignation),
        (status = 422, description = "Resignation is not pending")
    ),
    tag = "Resignation",
    security(("bearer_auth" = []))
)]
pub async fn approve_resignation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let resignation = resignation_service::approve(pool.get_ref(), path.into_inner(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(resignation))
}

#[utoipa::path(
    put,
    path = "/api/resignations/{resignation_id}/reject",
    params(("resignation_id", Path, description = "Resignation ID")),
    request_body = ReasonBody,
    responses(
        (status = 200, body = Resignation),
        (status = 422, description = "Resignation is not pending")
    ),
    tag = "Resignation",
    security(("bearer_auth" = []))
)]
pub async fn reject_resignation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReasonBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let resignation =
        resignation_service::reject(pool.get_ref(), path.into_inner(), auth.user_id, &payload.reason).await?;
    Ok(HttpResponse::Ok().json(resignation))
}

#[utoipa::path(
    put,
    path = "/api/resignations/{resignation_id}/withdraw",
    params(("resignation_id", Path, description = "Resignation ID")),
    responses(
        (status = 200, body = Resignation),
        (status = 403, description = "Not the employee who resigned"),
        (status = 422, description = "Resignation is not pending")
    ),
    tag = "Resignation",
    security(("bearer_auth" = []))
)]
pub async fn withdraw_resignation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let resignation = resignation_service::withdraw(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(resignation))
}
