use crate::{auth::auth::AuthUser, model::device_session::DeviceSession, service::session as session_service};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;

#[utoipa::path(
    get,
    path = "/api/sessions",
    responses((status = 200, description = "Active sessions, most recently used first", body = [DeviceSession])),
    tag = "Sessions",
    security(("bearer_auth" = []))
)]
pub async fn list_sessions(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let sessions = session_service::list(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "current_session_id": auth.session_id,
        "sessions": sessions
    })))
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{session_id}",
    params(("session_id", Path, description = "Device session ID")),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 404, description = "Session not found")
    ),
    tag = "Sessions",
    security(("bearer_auth" = []))
)]
pub async fn revoke_session(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    session_service::revoke(pool.get_ref(), auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Sign Out Other Devices
///
/// Keeps the session the request was made with.
#[utoipa::path(
    delete,
    path = "/api/sessions",
    responses((status = 200, body = Object, example = json!({ "revoked": 2 }))),
    tag = "Sessions",
    security(("bearer_auth" = []))
)]
pub async fn revoke_other_sessions(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let revoked = session_service::revoke_others(pool.get_ref(), auth.user_id, auth.session_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "revoked": revoked })))
}
