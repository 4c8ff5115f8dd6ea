use crate::{
    api::{Paginated, RentalListResponse},
    auth::auth::AuthUser,
    model::rental::Rental,
    service::{
        rental::{self as rental_service, CreateRental, RentalDetail, RentalQuery},
        settings,
    },
};
use actix_web::{HttpResponse, Responder, web};
use sqlx::MySqlPool;

#[utoipa::path(
    post,
    path = "/api/rentals",
    request_body = CreateRental,
    responses(
        (status = 201, body = RentalDetail),
        (status = 400, description = "No items or invalid dates"),
        (status = 404, description = "Unknown equipment")
    ),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn create_rental(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateRental>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let rental = rental_service::create(pool.get_ref(), &payload, auth.user_id).await?;
    Ok(HttpResponse::Created().json(rental))
}

#[utoipa::path(
    get,
    path = "/api/rentals",
    params(RentalQuery),
    responses((status = 200, body = RentalListResponse)),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn list_rentals(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RentalQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let per_page = settings::pagination_size(pool.get_ref()).await;
    let (rentals, page, total) = rental_service::list(pool.get_ref(), &query, per_page).await?;
    Ok(HttpResponse::Ok().json(Paginated::new(rentals, page, total)))
}

#[utoipa::path(
    get,
    path = "/api/rentals/overdue",
    responses((status = 200, description = "Active rentals past their expected end", body = [Rental])),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn overdue_rentals(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let rentals = rental_service::overdue(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(rentals))
}

#[utoipa::path(
    get,
    path = "/api/rentals/{rental_id}",
    params(("rental_id", Path, description = "Rental ID")),
    responses(
        (status = 200, body = RentalDetail),
        (status = 404, description = "Rental not found")
    ),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn get_rental(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let rental = rental_service::get(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rental))
}

/// Activate Rental
///
/// Every item's equipment must be available; it is marked rented.
#[utoipa::path(
    put,
    path = "/api/rentals/{rental_id}/activate",
    params(("rental_id", Path, description = "Rental ID")),
    responses(
        (status = 200, body = RentalDetail),
        (status = 409, description = "Equipment is not available"),
        (status = 422, description = "Rental is not pending")
    ),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn activate_rental(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let rental = rental_service::activate(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rental))
}

#[utoipa::path(
    put,
    path = "/api/rentals/{rental_id}/complete",
    params(("rental_id", Path, description = "Rental ID")),
    responses(
        (status = 200, body = RentalDetail),
        (status = 422, description = "Rental is not active")
    ),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn complete_rental(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let rental = rental_service::complete(pool.get_ref(), path.into_inner(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(rental))
}

#[utoipa::path(
    put,
    path = "/api/rentals/{rental_id}/cancel",
    params(("rental_id", Path, description = "Rental ID")),
    responses(
        (status = 200, body = RentalDetail),
        (status = 422, description = "Rental already finished")
    ),
    tag = "Rental",
    security(("bearer_auth" = []))
)]
pub async fn cancel_rental(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let rental = rental_service::cancel(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rental))
}
