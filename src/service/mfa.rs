use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::model::mfa::{
    BACKUP_CODE_COUNT, MfaBackupCode, MfaConfig, build_totp, generate_backup_code, matching_totp_step,
    normalize_code,
};
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::ToSchema;

const TOTP_METHOD: &str = "totp";

/// Everything an authenticator app and the user need, shown only once.
#[derive(Debug, Serialize, ToSchema)]
pub struct MfaEnrollment {
    /// Base32 secret for manual entry
    #[schema(example = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP")]
    pub secret: String,
    #[schema(example = "otpauth://totp/ERP:jdoe?secret=JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP&issuer=ERP")]
    pub otpauth_url: String,
    /// PNG of the otpauth URL, base64 encoded
    pub qr_code: String,
    #[schema(example = json!(["K3P9-2XQM"]))]
    pub backup_codes: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MfaStatus {
    pub enabled: bool,
    #[schema(example = "totp")]
    pub method: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub enabled_at: Option<NaiveDateTime>,
    pub remaining_backup_codes: i64,
}

async fn active_config(pool: &MySqlPool, user_id: u64) -> Result<Option<MfaConfig>, sqlx::Error> {
    sqlx::query_as::<_, MfaConfig>(
        r#"
        SELECT id, user_id, method, totp_secret, last_totp_step, is_active, enabled_at, created_at
        FROM mfa_configs
        WHERE user_id = ? AND is_active = TRUE
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn is_enabled(pool: &MySqlPool, user_id: u64) -> AppResult<bool> {
    Ok(active_config(pool, user_id).await?.is_some())
}

/// Activates a fresh TOTP configuration and returns its secret, QR code and backup codes.
///
/// Older configurations of the user are deactivated in the same transaction,
/// so a user never has two active ones.
pub async fn enable(pool: &MySqlPool, user_id: u64) -> AppResult<MfaEnrollment> {
    let codes: Vec<String> = (0..BACKUP_CODE_COUNT).map(|_| generate_backup_code()).collect();
    let hashes = codes
        .iter()
        .map(|c| hash_password(&normalize_code(c)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut tx = pool.begin().await?;

    let username = sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = ? FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let totp = build_totp(None, &username).map_err(AppError::internal)?;
    let secret = totp.get_secret_base32();
    let qr_code = totp
        .get_qr_base64()
        .map_err(|e| AppError::internal(format!("QR code rendering failed: {}", e)))?;

    sqlx::query("SELECT id FROM mfa_configs WHERE user_id = ? FOR UPDATE")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE mfa_configs SET is_active = FALSE WHERE user_id = ? AND is_active = TRUE")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let config_id = sqlx::query(
        r#"
        INSERT INTO mfa_configs (user_id, method, totp_secret, is_active, enabled_at)
        VALUES (?, ?, ?, TRUE, NOW())
        "#,
    )
    .bind(user_id)
    .bind(TOTP_METHOD)
    .bind(&secret)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    for hash in &hashes {
        sqlx::query("INSERT INTO mfa_backup_codes (mfa_config_id, code_hash) VALUES (?, ?)")
            .bind(config_id)
            .bind(hash)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    info!(user_id, config_id, "MFA enabled");
    Ok(MfaEnrollment {
        otpauth_url: totp.get_url(),
        secret,
        qr_code,
        backup_codes: codes,
    })
}

pub async fn disable(pool: &MySqlPool, user_id: u64, password: &str) -> AppResult<()> {
    let stored: String = sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    verify_password(password, &stored)
        .map_err(|_| AppError::Unauthorized("Invalid password".to_string()))?;

    let result = sqlx::query("UPDATE mfa_configs SET is_active = FALSE WHERE user_id = ? AND is_active = TRUE")
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::unprocessable("MFA is not enabled"));
    }

    info!(user_id, "MFA disabled");
    Ok(())
}

pub async fn status(pool: &MySqlPool, user_id: u64) -> AppResult<MfaStatus> {
    let config = match active_config(pool, user_id).await? {
        Some(c) => c,
        None => {
            return Ok(MfaStatus {
                enabled: false,
                method: None,
                enabled_at: None,
                remaining_backup_codes: 0,
            });
        }
    };

    let remaining = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM mfa_backup_codes WHERE mfa_config_id = ? AND used_at IS NULL",
    )
    .bind(config.id)
    .fetch_one(pool)
    .await?;

    Ok(MfaStatus {
        enabled: true,
        method: Some(config.method),
        enabled_at: config.enabled_at,
        remaining_backup_codes: remaining,
    })
}

/// Accepts a current authenticator code or consumes an unused backup code.
/// Returns false when neither matches.
pub async fn verify_code(pool: &MySqlPool, user_id: u64, code: &str) -> AppResult<bool> {
    let config = match active_config(pool, user_id).await? {
        Some(c) => c,
        None => return Ok(false),
    };

    if let Some(step) = totp_step(&config, code) {
        // each time step is accepted once, so an observed code cannot be replayed
        let fresh = sqlx::query(
            "UPDATE mfa_configs SET last_totp_step = ? WHERE id = ? AND (last_totp_step IS NULL OR last_totp_step < ?)",
        )
        .bind(step)
        .bind(config.id)
        .bind(step)
        .execute(pool)
        .await?
        .rows_affected()
            == 1;

        if !fresh {
            info!(user_id, "Replayed TOTP code rejected");
        }
        return Ok(fresh);
    }

    verify_backup_code(pool, &config, code).await
}

fn totp_step(config: &MfaConfig, code: &str) -> Option<u64> {
    let secret = config.totp_secret.as_deref()?;
    let totp = match build_totp(Some(secret), &config.user_id.to_string()) {
        Ok(t) => t,
        Err(e) => {
            warn!(config_id = config.id, error = %e, "Stored TOTP secret is unusable");
            return None;
        }
    };
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    matching_totp_step(&totp, code, now)
}

async fn verify_backup_code(pool: &MySqlPool, config: &MfaConfig, code: &str) -> AppResult<bool> {
    let user_id = config.user_id;
    let normalized = normalize_code(code);
    if normalized.is_empty() {
        return Ok(false);
    }

    let unused = sqlx::query_as::<_, MfaBackupCode>(
        "SELECT id, code_hash FROM mfa_backup_codes WHERE mfa_config_id = ? AND used_at IS NULL",
    )
    .bind(config.id)
    .fetch_all(pool)
    .await?;

    let matched = unused
        .iter()
        .find(|c| verify_password(&normalized, &c.code_hash).is_ok());

    let matched = match matched {
        Some(c) => c,
        None => return Ok(false),
    };

    // a concurrent login may have used the same code first
    let consumed = sqlx::query("UPDATE mfa_backup_codes SET used_at = NOW() WHERE id = ? AND used_at IS NULL")
        .bind(matched.id)
        .execute(pool)
        .await?
        .rows_affected()
        == 1;

    if consumed {
        info!(user_id, "MFA backup code used");
    }
    Ok(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(secret: Option<String>) -> MfaConfig {
        let created = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        MfaConfig {
            id: 1,
            user_id: 7,
            method: TOTP_METHOD.to_string(),
            totp_secret: secret,
            last_totp_step: None,
            is_active: true,
            enabled_at: Some(created),
            created_at: created,
        }
    }

    #[test]
    fn current_authenticator_code_is_accepted() {
        let totp = build_totp(None, "jdoe").unwrap();
        let enrolled = config(Some(totp.get_secret_base32()));

        let code = totp.generate_current().unwrap();
        assert!(totp_step(&enrolled, &code).is_some());
        assert_eq!(totp_step(&enrolled, "K3P9-2XQM"), None);
    }

    #[test]
    fn configs_without_a_secret_only_take_backup_codes() {
        assert_eq!(totp_step(&config(None), "123456"), None);
        assert_eq!(totp_step(&config(Some("not base32!".to_string())), "123456"), None);
    }

    #[test]
    fn secret_is_never_serialized() {
        let body = serde_json::to_value(config(Some("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP".to_string()))).unwrap();
        assert!(body.get("totp_secret").is_none());
        assert_eq!(body["method"], "totp");
    }
}
