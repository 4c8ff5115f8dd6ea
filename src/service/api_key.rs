use crate::auth::auth::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::model::api_key::{ApiKey, ApiScope, generate_key, parse_key};
use crate::model::role::Role;
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{info, warn};
use utoipa::ToSchema;

const CREATE_ATTEMPTS: usize = 3;

const SELECT_KEY: &str = r#"
    SELECT id, user_id, name, key_prefix, key_hash, scopes, last_used_at, expires_at, revoked_at, created_at
    FROM api_keys
"#;

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedApiKey {
    /// Shown once; only its hash is stored
    #[schema(example = "hrk_a1b2c3d4_00112233445566778899aabbccddeeff")]
    pub key: String,
    pub api_key: ApiKey,
}

/// Validates requested scopes; a key created without any is read-only.
fn normalize_scopes(scopes: Option<&[String]>) -> AppResult<String> {
    let mut parsed: Vec<ApiScope> = Vec::new();
    for raw in scopes.unwrap_or_default().iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let scope = ApiScope::from_str(&raw.to_lowercase())
            .map_err(|_| AppError::bad_request(format!("Unknown API key scope: {}", raw)))?;
        if !parsed.contains(&scope) {
            parsed.push(scope);
        }
    }
    if parsed.is_empty() {
        parsed.push(ApiScope::Read);
    }
    Ok(parsed.iter().map(AsRef::as_ref).collect::<Vec<&str>>().join(","))
}

pub async fn create(
    pool: &MySqlPool,
    user_id: u64,
    name: &str,
    expires_in_days: Option<u32>,
    scopes: Option<&[String]>,
) -> AppResult<CreatedApiKey> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("API key name must not be empty"));
    }

    let expires_at = expires_in_days
        .filter(|d| *d > 0)
        .map(|d| Utc::now().naive_utc() + Duration::days(d as i64));
    let scopes = normalize_scopes(scopes)?;

    for attempt in 1..=CREATE_ATTEMPTS {
        let (plaintext, prefix) = generate_key();
        let hash = hash_password(&plaintext)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO api_keys (user_id, name, key_prefix, key_hash, scopes, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(&prefix)
        .bind(&hash)
        .bind(&scopes)
        .bind(expires_at)
        .execute(pool)
        .await;

        match inserted {
            Ok(res) => {
                let api_key = sqlx::query_as::<_, ApiKey>(&format!("{} WHERE id = ?", SELECT_KEY))
                    .bind(res.last_insert_id())
                    .fetch_one(pool)
                    .await?;

                info!(user_id, key_id = api_key.id, "API key created");
                return Ok(CreatedApiKey { key: plaintext, api_key });
            }
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
                warn!(attempt, "API key prefix collision, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::internal("could not generate a unique API key prefix"))
}

/// Admins see every key, everyone else only their own.
pub async fn list(pool: &MySqlPool, auth: &AuthUser) -> AppResult<Vec<ApiKey>> {
    let keys = if auth.role == Role::Admin {
        sqlx::query_as::<_, ApiKey>(&format!("{} ORDER BY created_at DESC", SELECT_KEY))
            .fetch_all(pool)
            .await?
    } else {
        sqlx::query_as::<_, ApiKey>(&format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC",
            SELECT_KEY
        ))
        .bind(auth.user_id)
        .fetch_all(pool)
        .await?
    };

    Ok(keys)
}

pub async fn revoke(pool: &MySqlPool, auth: &AuthUser, key_id: u64) -> AppResult<()> {
    let key = sqlx::query_as::<_, ApiKey>(&format!("{} WHERE id = ?", SELECT_KEY))
        .bind(key_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("API key not found"))?;

    if key.user_id != auth.user_id && auth.role != Role::Admin {
        return Err(AppError::forbidden("Not allowed to revoke this API key"));
    }

    sqlx::query("UPDATE api_keys SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
        .bind(Utc::now().naive_utc())
        .bind(key_id)
        .execute(pool)
        .await?;

    info!(key_id, revoked_by = auth.user_id, "API key revoked");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct KeyOwner {
    username: String,
    role_id: u8,
    employee_id: Option<u64>,
    is_active: bool,
}

/// Resolves a presented key to the principal that owns it.
pub async fn authenticate(pool: &MySqlPool, presented: &str) -> AppResult<AuthUser> {
    let invalid = || AppError::Unauthorized("Invalid API key".to_string());

    let prefix = parse_key(presented).ok_or_else(invalid)?;

    let key = sqlx::query_as::<_, ApiKey>(&format!("{} WHERE key_prefix = ?", SELECT_KEY))
        .bind(prefix)
        .fetch_optional(pool)
        .await?
        .ok_or_else(invalid)?;

    if !key.is_usable(Utc::now().naive_utc()) {
        return Err(AppError::Unauthorized("API key revoked or expired".to_string()));
    }

    verify_password(presented.trim(), &key.key_hash).map_err(|_| invalid())?;

    let owner = sqlx::query_as::<_, KeyOwner>(
        "SELECT username, role_id, employee_id, is_active FROM users WHERE id = ?",
    )
    .bind(key.user_id)
    .fetch_optional(pool)
    .await?
    .filter(|o| o.is_active)
    .ok_or_else(invalid)?;

    let role = Role::from_id(owner.role_id).ok_or_else(invalid)?;

    if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
        .bind(Utc::now().naive_utc())
        .bind(key.id)
        .execute(pool)
        .await
    {
        warn!(error = %e, key_id = key.id, "Failed to record API key use");
    }

    Ok(AuthUser {
        user_id: key.user_id,
        username: owner.username,
        role,
        employee_id: owner.employee_id,
        session_id: None,
        scopes: Some(key.scope_list()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_trimmed_and_joined() {
        let scopes = vec![" Write ".to_string(), "".to_string(), "read".to_string(), "write".to_string()];
        assert_eq!(normalize_scopes(Some(scopes.as_slice())).unwrap(), "write,read");
        assert_eq!(normalize_scopes(Some(&[][..])).unwrap(), "read");
        assert_eq!(normalize_scopes(None).unwrap(), "read");
    }

    #[test]
    fn unknown_scopes_are_rejected() {
        let scopes = vec!["timesheets:read".to_string()];
        assert!(matches!(normalize_scopes(Some(scopes.as_slice())), Err(AppError::BadRequest(_))));
    }
}
