use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    models::{LoginReqDto, TokenPair, UserReq},
    service::auth::{self as auth_service, ClientMeta, LoginOutcome},
};
use actix_web::{HttpRequest, HttpResponse, Responder, http::header, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};

/// Token from an `Authorization: Bearer ...` header, if any.
fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn client_meta(req: &HttpRequest) -> ClientMeta {
    let conn = req.connection_info();
    ClientMeta {
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: conn.realip_remote_addr().map(str::to_string),
    }
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = UserReq,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Invalid username or weak password"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, user), fields(username = %user.username))]
pub async fn register(user: web::Json<UserReq>, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let user_id = auth_service::register(pool.get_ref(), &user).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user_id": user_id
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, body = TokenPair),
        (status = 401, description = "Invalid credentials, or `{\"mfa_required\": true}`"),
        (status = 403, description = "Account disabled")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(req, pool, config, user), fields(username = %user.username))]
pub async fn login(
    req: HttpRequest,
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");
    let meta = client_meta(&req);

    match auth_service::login(pool.get_ref(), &config, &user, &meta).await? {
        LoginOutcome::Tokens(pair) => Ok(HttpResponse::Ok().json(pair)),
        LoginOutcome::MfaRequired => {
            debug!("MFA code required");
            Ok(HttpResponse::Unauthorized().json(json!({
                "message": "MFA code required",
                "mfa_required": true
            })))
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip(req, pool, config))]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let token = bearer_token(&req).ok_or_else(|| AppError::Unauthorized("No token".to_string()))?;
    let pair = auth_service::rotate_refresh_token(pool.get_ref(), &config, token).await?;
    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out, also for unknown tokens")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_logout", skip(req, pool, config))]
pub async fn logout(req: HttpRequest, pool: web::Data<MySqlPool>, config: web::Data<Config>) -> impl Responder {
    if let Some(token) = bearer_token(&req) {
        auth_service::logout(pool.get_ref(), &config, token).await;
    }
    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Authenticated principal", body = Object, example = json!({
        "user": { "user_id": 4, "username": "jdoe", "role": "employee", "employee_id": 12, "session_id": 31 },
        "is_employee": true,
        "is_hr_or_admin": false
    }))),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "is_employee": auth.is_employee(),
        "is_hr_or_admin": auth.is_hr_or_admin(),
        "user": auth,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn bearer_token_requires_scheme() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn client_meta_reads_user_agent() {
        let req = TestRequest::default()
            .insert_header((header::USER_AGENT, "Mozilla/5.0 (iPhone)"))
            .peer_addr("10.0.0.7:5000".parse().unwrap())
            .to_http_request();

        let meta = client_meta(&req);
        assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0 (iPhone)"));
        assert_eq!(meta.ip_address.as_deref(), Some("10.0.0.7"));
    }
}
