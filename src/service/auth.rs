use crate::auth::jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token};
use crate::auth::password::{hash_password, verify_password};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::role::Role;
use crate::model::system_setting::PasswordPolicy;
use crate::models::{Claims, LoginReqDto, TokenPair, TokenType, UserReq, UserSql};
use crate::service::{mfa, session, settings};
use crate::utils::identity_filter::{self, Identity};
use sqlx::{MySql, MySqlPool};
use tracing::{debug, error, info, warn};

const MAX_USERNAME_LEN: usize = 100;

/// true  => username AVAILABLE
/// false => username TAKEN
pub async fn is_username_available(pool: &MySqlPool, username: &str) -> AppResult<bool> {
    let username = username.trim().to_lowercase();

    // cuckoo filter gives a fast negative
    if !identity_filter::might_exist(Identity::Username, &username) {
        return Ok(true);
    }

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(&username)
        .fetch_one(pool)
        .await?;

    Ok(count == 0)
}

/// Username must be free and the password must satisfy the configured policy.
pub async fn validate_new_credentials(
    pool: &MySqlPool,
    username: &str,
    password: &str,
    policy: &PasswordPolicy,
) -> AppResult<()> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Username and password must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request("Username is too long"));
    }

    let broken = policy.violations(password);
    if !broken.is_empty() {
        return Err(AppError::unprocessable(format!("Password {}", broken.join(", "))));
    }

    if !is_username_available(pool, username).await? {
        return Err(AppError::conflict("Username already taken"));
    }

    Ok(())
}

/// Privileged roles can only be self-registered while the system has no users.
fn registrable(role: Role, first_user: bool) -> bool {
    first_user || matches!(role, Role::Employee | Role::ApiUser)
}

pub async fn register(pool: &MySqlPool, req: &UserReq) -> AppResult<u64> {
    let role = match req.role_id {
        Some(id) => Role::from_id(id).ok_or_else(|| AppError::bad_request("Unknown role"))?,
        None => Role::Employee,
    };

    let user_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if !registrable(role, user_count == 0) {
        return Err(AppError::forbidden("Role cannot be self-registered"));
    }

    let policy = settings::password_policy(pool).await?;
    validate_new_credentials(pool, &req.username, &req.password, &policy).await?;

    let username = req.username.trim().to_lowercase();
    let hashed = hash_password(&req.password)?;

    let user_id = sqlx::query("INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)")
        .bind(&username)
        .bind(&hashed)
        .bind(role.id())
        .execute(pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::conflict("Username already exists"),
            other => other,
        })?
        .last_insert_id();

    identity_filter::insert(Identity::Username, &username);

    info!(user_id, role = %role, "User registered");
    Ok(user_id)
}

/// Where a login or refresh came from.
#[derive(Debug, Default)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

pub enum LoginOutcome {
    Tokens(TokenPair),
    MfaRequired,
}

async fn store_refresh_token<'e, E>(executor: E, claims: &Claims) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, session_id, jti, expires_at)
        VALUES (?, ?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(claims.sid)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(executor)
    .await?;
    Ok(())
}

fn subject_of(user: &UserSql, session_id: Option<u64>) -> TokenSubject {
    TokenSubject {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role_id,
        employee_id: user.employee_id,
        session_id,
    }
}

async fn find_user<'e, E>(executor: E, column: &str, value: &str) -> Result<Option<UserSql>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, UserSql>(&format!(
        "SELECT id, username, password, role_id, employee_id, is_active FROM users WHERE {} = ?",
        column
    ))
    .bind(value)
    .fetch_optional(executor)
    .await
}

pub async fn login(
    pool: &MySqlPool,
    config: &Config,
    req: &LoginReqDto,
    meta: &ClientMeta,
) -> AppResult<LoginOutcome> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("Username or password required"));
    }

    debug!("Fetching user from database");
    let user = find_user(pool, "username", &req.username.trim().to_lowercase())
        .await?
        .ok_or_else(|| {
            info!("Invalid credentials: user not found");
            invalid()
        })?;

    if let Err(e) = verify_password(&req.password, &user.password) {
        info!(error = %e, user_id = user.id, "Invalid credentials: password mismatch");
        return Err(invalid());
    }

    if !user.is_active {
        return Err(AppError::forbidden("Account is disabled"));
    }

    if mfa::is_enabled(pool, user.id).await? {
        let code = match req.mfa_code.as_deref() {
            Some(c) => c,
            None => return Ok(LoginOutcome::MfaRequired),
        };
        if !mfa::verify_code(pool, user.id, code).await? {
            info!(user_id = user.id, "Invalid MFA code");
            return Err(AppError::Unauthorized("Invalid MFA code".to_string()));
        }
    }

    let session_id = session::start(
        pool,
        session::NewSession {
            user_id: user.id,
            device_name: req.device_name.as_deref(),
            user_agent: meta.user_agent.as_deref(),
            ip_address: meta.ip_address.as_deref(),
        },
    )
    .await?;

    let subject = subject_of(&user, Some(session_id));
    let access_token = generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool, &refresh_claims).await?;

    // not fatal for the login
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user.id)
        .execute(pool)
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = user.id, session_id, "Login successful");
    Ok(LoginOutcome::Tokens(TokenPair { access_token, refresh_token }))
}

#[derive(sqlx::FromRow)]
struct StoredRefresh {
    id: u64,
    revoked: bool,
}

/// Exchanges a refresh token for a new pair; the presented token is revoked.
pub async fn rotate_refresh_token(pool: &MySqlPool, config: &Config, token: &str) -> AppResult<TokenPair> {
    let unauthorized = |msg: &str| AppError::Unauthorized(msg.to_string());

    let claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized("Invalid token"))?;
    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized("Not a refresh token"));
    }

    if let Some(sid) = claims.sid {
        if !session::is_active(pool, sid).await? {
            return Err(unauthorized("Session has been revoked"));
        }
    }

    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, StoredRefresh>(
        "SELECT id, revoked FROM refresh_tokens WHERE jti = ? FOR UPDATE",
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?
    .filter(|r| !r.revoked)
    .ok_or_else(|| unauthorized("Refresh token revoked"))?;

    // role or employee link may have changed since the last login
    let user = find_user(&mut *tx, "id", &claims.user_id.to_string())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| unauthorized("Account is disabled"))?;

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record.id)
        .execute(&mut *tx)
        .await?;

    let subject = subject_of(&user, claims.sid);
    let access_token = generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)?;
    let (refresh_token, new_claims) =
        generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)?;
    store_refresh_token(&mut *tx, &new_claims).await?;

    tx.commit().await?;

    if let Some(sid) = claims.sid {
        session::touch(pool, sid).await;
    }

    Ok(TokenPair { access_token, refresh_token })
}

/// Revokes the refresh token and ends its session. Unknown tokens are ignored.
pub async fn logout(pool: &MySqlPool, config: &Config, token: &str) {
    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return,
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool)
        .await
    {
        warn!(error = %e, "Failed to revoke refresh token");
    }

    if let Some(sid) = claims.sid {
        if let Err(e) = session::end(pool, sid).await {
            warn!(error = %e, session_id = sid, "Failed to end session on logout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_roles_only_for_first_user() {
        assert!(registrable(Role::Admin, true));
        assert!(!registrable(Role::Admin, false));
        assert!(!registrable(Role::Hr, false));
        assert!(registrable(Role::Employee, false));
    }
}
