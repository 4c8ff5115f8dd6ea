use crate::{
    api::ReasonBody,
    auth::auth::AuthUser,
    model::rental_extension::RentalExtension,
    service::rental_extension::{self as extension_service, RequestExtension},
};
use actix_web::{HttpResponse, Responder, web};
use sqlx::MySqlPool;

/// Request Rental Extension
///
/// The new end date must be in the future and after the current expected end.
#[utoipa::path(
    post,
    path = "/api/rentals/{rental_id}/extensions",
    params(("rental_id", Path, description = "Rental ID")),
    request_body = RequestExtension,
    responses(
        (status = 201, body = RentalExtension),
        (status = 400, description = "End date not after the current one or reason too short"),
        (status = 409, description = "Rental already has a pending extension"),
        (status = 422, description = "Rental is completed or cancelled")
    ),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn request_extension(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RequestExtension>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let extension = extension_service::request(pool.get_ref(), path.into_inner(), &payload, auth.user_id).await?;
    Ok(HttpResponse::Created().json(extension))
}

#[utoipa::path(
    get,
    path = "/api/rentals/{rental_id}/extensions",
    params(("rental_id", Path, description = "Rental ID")),
    responses((status = 200, body = [RentalExtension])),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn list_extensions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let extensions = extension_service::list_for_rental(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(extensions))
}

/// Approve Rental Extension
///
/// Moves the rental's expected end date and re-prices it.
#[utoipa::path(
    put,
    path = "/api/rental-extensions/{extension_id}/approve",
    params(("extension_id", Path, description = "Rental extension ID")),
    responses(
        (status = 200, body = RentalExtension),
        (status = 404, description = "Rental extension not found"),
        (status = 422, description = "Extension is not pending or the rental has ended")
    ),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn approve_extension(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let extension = extension_service::approve(pool.get_ref(), path.into_inner(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(extension))
}

#[utoipa::path(
    put,
    path = "/api/rental-extensions/{extension_id}/reject",
    params(("extension_id", Path, description = "Rental extension ID")),
    request_body = ReasonBody,
    responses(
        (status = 200, body = RentalExtension),
        (status = 400, description = "Reason shorter than 5 characters"),
        (status = 422, description = "Extension is not pending")
    ),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn reject_extension(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReasonBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let extension =
        extension_service::reject(pool.get_ref(), path.into_inner(), auth.user_id, &payload.reason).await?;
    Ok(HttpResponse::Ok().json(extension))
}
