use crate::{
    api::{Paginated, ReasonBody, SettlementListResponse},
    auth::auth::AuthUser,
    model::final_settlement::FinalSettlement,
    service::{
        final_settlement::{self as settlement_service, AdjustSettlement, CreateSettlement, PaySettlement, SettlementQuery},
        settings,
    },
};
use actix_web::{HttpResponse, Responder, web};
use sqlx::MySqlPool;

/// Calculate Final Settlement
///
/// Approving a resignation already does this; use it to settle again after a cancellation.
#[utoipa::path(
    post,
    path = "/api/final-settlements",
    request_body = CreateSettlement,
    responses(
        (status = 201, body = FinalSettlement),
        (status = 404, description = "Resignation not found"),
        (status = 409, description = "Employee already has an open settlement"),
        (status = 422, description = "Resignation is not approved")
    ),
    tag = "Final Settlement",
    security(("bearer_auth" = []))
)]
pub async fn create_settlement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSettlement>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let settlement = settlement_service::create(pool.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(settlement))
}

#[utoipa::path(
    get,
    path = "/api/final-settlements",
    params(SettlementQuery),
    responses((status = 200, body = SettlementListResponse)),
    tag = "Final Settlement",
    security(("bearer_auth" = []))
)]
pub async fn list_settlements(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SettlementQuery>,
) -> actix_web::Result<impl Responder> {
    let per_page = settings::pagination_size(pool.get_ref()).await;
    let (rows, page, total) = settlement_service::list(pool.get_ref(), &auth, &query, per_page).await?;
    Ok(HttpResponse::Ok().json(Paginated::new(rows, page, total)))
}

#[utoipa::path(
    get,
    path = "/api/final-settlements/{settlement_id}",
    params(("settlement_id", Path, description = "Final settlement ID")),
    responses(
        (status = 200, body = FinalSettlement),
        (status = 404, description = "Final settlement not found")
    ),
    tag = "Final Settlement",
    security(("bearer_auth" = []))
)]
pub async fn get_settlement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let settlement = settlement_service::get(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(settlement.employee_id)?;

    Ok(HttpResponse::Ok().json(settlement))
}

#[utoipa::path(
    put,
    path = "/api/final-settlements/{settlement_id}",
    params(("settlement_id", Path, description = "Final settlement ID")),
    request_body = AdjustSettlement,
    responses(
        (status = 200, body = FinalSettlement),
        (status = 400, description = "Negative amount"),
        (status = 422, description = "Settlement is not pending")
    ),
    tag = "Final Settlement",
    security(("bearer_auth" = []))
)]
pub async fn adjust_settlement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AdjustSettlement>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let settlement = settlement_service::adjust(pool.get_ref(), path.into_inner(), &payload).await?;
    Ok(HttpResponse::Ok().json(settlement))
}

#[utoipa::path(
    put,
    path = "/api/final-settlements/{settlement_id}/approve",
    params(("settlement_id", Path, description = "Final settlement ID")),
    responses(
        (status = 200, body = FinalSettlement),
        (status = 422, description = "Settlement is not pending")
    ),
    tag = "Final Settlement",
    security(("bearer_auth" = []))
)]
pub async fn approve_settlement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let settlement = settlement_service::approve(pool.get_ref(), path.into_inner(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(settlement))
}

/// Pay Final Settlement
///
/// Also closes the employee's outstanding salary advances.
#[utoipa::path(
    put,
    path = "/api/final-settlements/{settlement_id}/pay",
    params(("settlement_id", Path, description = "Final settlement ID")),
    request_body = PaySettlement,
    responses(
        (status = 200, body = FinalSettlement),
        (status = 422, description = "Settlement is not approved")
    ),
    tag = "Final Settlement",
    security(("bearer_auth" = []))
)]
pub async fn pay_settlement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<PaySettlement>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let settlement = settlement_service::mark_paid(pool.get_ref(), path.into_inner(), &payload).await?;
    Ok(HttpResponse::Ok().json(settlement))
}

#[utoipa::path(
    put,
    path = "/api/final-settlements/{settlement_id}/cancel",
    params(("settlement_id", Path, description = "Final settlement ID")),
    request_body = ReasonBody,
    responses(
        (status = 200, body = FinalSettlement),
        (status = 422, description = "Settlement is already paid or cancelled")
    ),
    tag = "Final Settlement",
    security(("bearer_auth" = []))
)]
pub async fn cancel_settlement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReasonBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let settlement = settlement_service::cancel(pool.get_ref(), path.into_inner(), &payload.reason).await?;
    Ok(HttpResponse::Ok().json(settlement))
}
