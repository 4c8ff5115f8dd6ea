use crate::{
    auth::auth::AuthUser,
    model::api_key::ApiKey,
    service::api_key::{self as api_key_service, CreatedApiKey},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateApiKey {
    #[schema(example = "Mobile sync")]
    pub name: String,
    /// Days until the key expires; never expires when omitted
    #[schema(example = 90)]
    pub expires_in_days: Option<u32>,
    /// Any of `read`, `write`, `admin`; read-only when omitted
    #[schema(example = json!(["read", "write"]))]
    pub scopes: Option<Vec<String>>,
}

/// Create API Key
///
/// The plaintext key is part of this response only.
#[utoipa::path(
    post,
    path = "/api/api-keys",
    request_body = CreateApiKey,
    responses(
        (status = 201, body = CreatedApiKey),
        (status = 400, description = "Missing name or unknown scope")
    ),
    tag = "API Keys",
    security(("bearer_auth" = []))
)]
pub async fn create_api_key(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateApiKey>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let created = api_key_service::create(
        pool.get_ref(),
        auth.user_id,
        &payload.name,
        payload.expires_in_days,
        payload.scopes.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/api-keys",
    responses((status = 200, body = [ApiKey])),
    tag = "API Keys",
    security(("bearer_auth" = []))
)]
pub async fn list_api_keys(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let keys = api_key_service::list(pool.get_ref(), &auth).await?;
    Ok(HttpResponse::Ok().json(keys))
}

#[utoipa::path(
    delete,
    path = "/api/api-keys/{key_id}",
    params(("key_id", Path, description = "API key ID")),
    responses(
        (status = 204, description = "Revoked"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "API key not found")
    ),
    tag = "API Keys",
    security(("bearer_auth" = []))
)]
pub async fn revoke_api_key(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    api_key_service::revoke(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
