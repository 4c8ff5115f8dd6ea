use crate::{
    auth::auth::AuthUser,
    service::mfa::{self as mfa_service, MfaEnrollment, MfaStatus},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct DisableMfa {
    #[schema(example = "Str0ngPass")]
    pub password: String,
}

/// Enable MFA
///
/// Returns a TOTP secret with its otpauth URL and QR code, plus fresh backup codes.
/// None of them are shown again. Any earlier configuration and its codes stop working.
#[utoipa::path(
    post,
    path = "/api/mfa/enable",
    responses((status = 200, body = MfaEnrollment)),
    tag = "MFA",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool), fields(user_id = auth.user_id))]
pub async fn enable_mfa(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let enrollment = mfa_service::enable(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(enrollment))
}

#[utoipa::path(
    post,
    path = "/api/mfa/disable",
    request_body = DisableMfa,
    responses(
        (status = 200, body = Object, example = json!({ "message": "MFA disabled" })),
        (status = 401, description = "Wrong password")
    ),
    tag = "MFA",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn disable_mfa(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<DisableMfa>,
) -> actix_web::Result<impl Responder> {
    mfa_service::disable(pool.get_ref(), auth.user_id, &payload.password).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "MFA disabled" })))
}

#[utoipa::path(
    get,
    path = "/api/mfa/status",
    responses((status = 200, body = MfaStatus)),
    tag = "MFA",
    security(("bearer_auth" = []))
)]
pub async fn mfa_status(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let status = mfa_service::status(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(status))
}
