use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::TokenType;
use crate::service::api_key;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use sqlx::MySqlPool;

pub const API_KEY_HEADER: &str = "X-API-Key";

fn reject(req: ServiceRequest, message: &str) -> Result<ServiceResponse<BoxBody>, Error> {
    let resp = AppError::Unauthorized(message.to_string()).error_response();
    Ok(req.into_response(resp))
}

/// Authenticates with a Bearer access token or an `X-API-Key` header.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| AppError::internal("App config missing"))?;

    if let Some(key) = req.headers().get(API_KEY_HEADER) {
        let key = match key.to_str() {
            Ok(k) => k.to_string(),
            Err(_) => return reject(req, "Invalid API key encoding"),
        };

        let pool = req
            .app_data::<Data<MySqlPool>>()
            .cloned()
            .ok_or_else(|| AppError::internal("Database pool missing"))?;

        return match api_key::authenticate(pool.get_ref(), &key).await {
            Ok(auth_user) => admit(req, next, auth_user).await,
            Err(AppError::Unauthorized(msg)) => reject(req, &msg),
            Err(e) => Ok(req.into_response(e.error_response())),
        };
    }

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v,
            Err(_) => return reject(req, "Invalid Authorization header encoding"),
        },
        None => return reject(req, "Missing Authorization header"),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return reject(req, "Authorization header must start with Bearer"),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            return reject(req, "Invalid or expired token");
        }
    };

    if claims.token_type != TokenType::Access {
        return reject(req, "Refresh tokens cannot access the API");
    }

    let role = match Role::from_id(claims.role) {
        Some(role) => role,
        None => return reject(req, "Invalid role"),
    };

    let auth_user = AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        employee_id: claims.employee_id,
        session_id: claims.sid,
        scopes: None,
    };

    admit(req, next, auth_user).await
}

/// Hands a resolved principal to the handler once its key scopes allow the method.
async fn admit(
    req: ServiceRequest,
    next: Next<BoxBody>,
    auth_user: AuthUser,
) -> Result<ServiceResponse<BoxBody>, Error> {
    if let Err(e) = auth_user.require_method_scope(req.method()) {
        tracing::debug!(user_id = auth_user.user_id, method = %req.method(), "API key scope denied");
        return Ok(req.into_response(e.error_response()));
    }
    req.extensions_mut().insert(auth_user);
    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token, generate_refresh_token};
    use crate::model::api_key::ApiScope;
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, test, web};

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: 5,
            username: "hr.user".to_string(),
            role: Role::Hr.id(),
            employee_id: None,
            session_id: Some(1),
        }
    }

    async fn whoami(auth: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(auth.username)
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(Data::new(Config::for_tests()))
                    .service(
                        web::scope("/api")
                            .wrap(from_fn(auth_middleware))
                            .route("/me", web::get().to(whoami)),
                    ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn access_token_reaches_handler() {
        let app = app!();
        let token = generate_access_token(&subject(), &Config::for_tests().jwt_secret, 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "hr.user");
    }

    #[actix_web::test]
    async fn refresh_token_is_not_an_access_token() {
        let app = app!();
        let (token, _) =
            generate_refresh_token(&subject(), &Config::for_tests().jwt_secret, 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn malformed_scheme_is_rejected() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", "Token abc"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    async fn as_read_only_key(req: ServiceRequest, next: Next<BoxBody>) -> Result<ServiceResponse<BoxBody>, Error> {
        let key_user = AuthUser {
            user_id: 9,
            username: "reporting".to_string(),
            role: Role::Hr,
            employee_id: None,
            session_id: None,
            scopes: Some(vec![ApiScope::Read]),
        };
        admit(req, next, key_user).await
    }

    #[actix_web::test]
    async fn read_only_key_is_refused_on_writes() {
        let app = test::init_service(
            App::new().service(
                web::scope("/api")
                    .wrap(from_fn(as_read_only_key))
                    .route("/me", web::get().to(whoami))
                    .route("/me", web::post().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/me").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "reporting");

        let req = test::TestRequest::post().uri("/api/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
