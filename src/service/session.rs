use crate::error::{AppError, AppResult};
use crate::model::device_session::{DeviceSession, device_label};
use sqlx::MySqlPool;
use tracing::{info, warn};

pub struct NewSession<'a> {
    pub user_id: u64,
    pub device_name: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub ip_address: Option<&'a str>,
}

pub async fn start(pool: &MySqlPool, new: NewSession<'_>) -> AppResult<u64> {
    let user_agent = new.user_agent.map(|ua| ua.chars().take(512).collect::<String>());

    let id = sqlx::query(
        r#"
        INSERT INTO device_sessions (user_id, device_name, user_agent, ip_address)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(new.user_id)
    .bind(device_label(new.device_name, new.user_agent))
    .bind(user_agent)
    .bind(new.ip_address)
    .execute(pool)
    .await?
    .last_insert_id();

    Ok(id)
}

pub async fn is_active(pool: &MySqlPool, session_id: u64) -> AppResult<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM device_sessions WHERE id = ? AND revoked_at IS NULL",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Bumps `last_active_at`; failures are logged only.
pub async fn touch(pool: &MySqlPool, session_id: u64) {
    if let Err(e) = sqlx::query("UPDATE device_sessions SET last_active_at = NOW() WHERE id = ?")
        .bind(session_id)
        .execute(pool)
        .await
    {
        warn!(error = %e, session_id, "Failed to touch device session");
    }
}

/// Ends a session and revokes every refresh token issued for it.
pub async fn end(pool: &MySqlPool, session_id: u64) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE device_sessions SET revoked_at = NOW() WHERE id = ? AND revoked_at IS NULL")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE session_id = ?")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn list(pool: &MySqlPool, user_id: u64) -> AppResult<Vec<DeviceSession>> {
    let sessions = sqlx::query_as::<_, DeviceSession>(
        r#"
        SELECT id, user_id, device_name, user_agent, ip_address, last_active_at, revoked_at, created_at
        FROM device_sessions
        WHERE user_id = ? AND revoked_at IS NULL
        ORDER BY last_active_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

pub async fn revoke(pool: &MySqlPool, user_id: u64, session_id: u64) -> AppResult<()> {
    let owned = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM device_sessions WHERE id = ? AND user_id = ? AND revoked_at IS NULL",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    if owned == 0 {
        return Err(AppError::not_found("Session not found"));
    }

    end(pool, session_id).await?;
    info!(user_id, session_id, "Device session revoked");
    Ok(())
}

/// Revokes every session of the user except `keep`; returns how many ended.
pub async fn revoke_others(pool: &MySqlPool, user_id: u64, keep: Option<u64>) -> AppResult<u64> {
    let ids: Vec<u64> = sqlx::query_scalar(
        "SELECT id FROM device_sessions WHERE user_id = ? AND revoked_at IS NULL",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut revoked = 0u64;
    for id in ids.into_iter().filter(|id| Some(*id) != keep) {
        end(pool, id).await?;
        revoked += 1;
    }

    info!(user_id, revoked, "Other device sessions revoked");
    Ok(revoked)
}
