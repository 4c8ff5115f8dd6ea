use crate::error::{AppError, AppResult};
use crate::model::system_setting::{
    CATEGORIES, PasswordPolicy, SettingType, SystemSetting, default_settings, describe_key,
    serialize_value, validate_setting,
};
use crate::utils::settings_cache;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{MySql, MySqlPool, Transaction};
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display};
use tracing::{info, warn};
use utoipa::ToSchema;

/// `{category: {key: value}}` as accepted by updates and returned by reads.
pub type GroupedSettings = BTreeMap<String, Map<String, Value>>;

async fn snapshot(pool: &MySqlPool) -> AppResult<settings_cache::SettingsSnapshot> {
    settings_cache::all_settings(pool)
        .await
        .map_err(|e| AppError::internal(format!("settings load failed: {}", e)))
}

fn group<'a>(settings: impl Iterator<Item = &'a SystemSetting>) -> GroupedSettings {
    let mut grouped = GroupedSettings::new();
    for setting in settings {
        grouped
            .entry(setting.category.clone())
            .or_default()
            .insert(setting.setting_key.clone(), setting.typed_value());
    }
    grouped
}

pub async fn get_all(pool: &MySqlPool) -> AppResult<GroupedSettings> {
    Ok(group(snapshot(pool).await?.iter()))
}

pub async fn get_public(pool: &MySqlPool) -> AppResult<GroupedSettings> {
    Ok(group(snapshot(pool).await?.iter().filter(|s| s.is_public)))
}

/// Typed value of one setting, `None` when the key does not exist.
pub async fn get_setting(pool: &MySqlPool, key: &str) -> AppResult<Option<Value>> {
    Ok(snapshot(pool)
        .await?
        .iter()
        .find(|s| s.setting_key == key)
        .map(SystemSetting::typed_value))
}

pub async fn get_bool(pool: &MySqlPool, key: &str, default: bool) -> AppResult<bool> {
    Ok(get_setting(pool, key)
        .await?
        .and_then(|v| v.as_bool())
        .unwrap_or(default))
}

pub async fn get_u64(pool: &MySqlPool, key: &str, default: u64) -> AppResult<u64> {
    Ok(get_setting(pool, key)
        .await?
        .and_then(|v| v.as_u64())
        .unwrap_or(default))
}

pub async fn password_policy(pool: &MySqlPool) -> AppResult<PasswordPolicy> {
    let defaults = PasswordPolicy::default();
    Ok(PasswordPolicy {
        min_length: get_u64(pool, "password_min_length", defaults.min_length as u64).await? as usize,
        require_uppercase: get_bool(pool, "password_require_uppercase", defaults.require_uppercase).await?,
        require_lowercase: get_bool(pool, "password_require_lowercase", defaults.require_lowercase).await?,
        require_numbers: get_bool(pool, "password_require_numbers", defaults.require_numbers).await?,
        require_symbols: get_bool(pool, "password_require_symbols", defaults.require_symbols).await?,
    })
}

/// Default page size for list endpoints.
pub async fn pagination_size(pool: &MySqlPool) -> u32 {
    match get_u64(pool, "pagination_size", 15).await {
        Ok(size) => size.clamp(1, 100) as u32,
        Err(e) => {
            warn!(error = %e, "Falling back to default pagination size");
            15
        }
    }
}

async fn upsert(
    tx: &mut Transaction<'_, MySql>,
    key: &str,
    value: &str,
    kind: SettingType,
    category: &str,
    description: &str,
    is_public: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO system_settings (setting_key, value, setting_type, category, description, is_public)
        VALUES (?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            value = VALUES(value),
            setting_type = VALUES(setting_type),
            category = VALUES(category),
            description = VALUES(description),
            is_public = VALUES(is_public)
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(kind.as_ref())
    .bind(category)
    .bind(description)
    .bind(is_public)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Type and visibility a value is written with; new keys take the type of their value.
fn stored_kind(existing: Option<(String, bool)>, value: &Value) -> (SettingType, bool) {
    match existing {
        Some((kind, is_public)) => (kind.parse().unwrap_or_else(|_| SettingType::infer(value)), is_public),
        None => (SettingType::infer(value), false),
    }
}

/// Upserts every `{category: {key: value}}` pair in one transaction; any invalid value aborts all.
pub async fn update_settings(pool: &MySqlPool, settings: &GroupedSettings) -> AppResult<usize> {
    if settings.values().all(Map::is_empty) {
        return Err(AppError::bad_request("No settings provided"));
    }

    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for (category, entries) in settings {
        for (key, value) in entries {
            if key.trim().is_empty() {
                return Err(AppError::bad_request("Setting keys must not be empty"));
            }

            // existing rows keep their type and public flag
            let existing = sqlx::query_as::<_, (String, bool)>(
                "SELECT setting_type, is_public FROM system_settings WHERE setting_key = ?",
            )
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
            let (kind, is_public) = stored_kind(existing, value);

            validate_setting(key, kind, value)
                .map_err(|msg| AppError::unprocessable(format!("{}.{} {}", category, key, msg)))?;

            upsert(&mut tx, key, &serialize_value(value), kind, category, &describe_key(key), is_public).await?;
            count += 1;
        }
    }

    tx.commit().await?;
    settings_cache::invalidate().await;

    info!(count, "System settings updated");
    Ok(count)
}

async fn seed_defaults(tx: &mut Transaction<'_, MySql>, category: Option<&str>) -> Result<usize, sqlx::Error> {
    let mut seeded = 0usize;
    for default in default_settings()
        .into_iter()
        .filter(|d| category.is_none_or(|c| c == d.category))
    {
        upsert(
            tx,
            default.key,
            &serialize_value(&default.value),
            default.kind,
            default.category,
            default.description,
            default.is_public,
        )
        .await?;
        seeded += 1;
    }
    Ok(seeded)
}

pub async fn reset_all(pool: &MySqlPool) -> AppResult<usize> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM system_settings").execute(&mut *tx).await?;
    let seeded = seed_defaults(&mut tx, None).await?;
    tx.commit().await?;

    settings_cache::invalidate().await;
    info!(seeded, "System settings reset to defaults");
    Ok(seeded)
}

pub async fn reset_category(pool: &MySqlPool, category: &str) -> AppResult<usize> {
    if !CATEGORIES.contains(&category) {
        return Err(AppError::not_found(format!("Unknown settings category '{}'", category)));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM system_settings WHERE category = ?")
        .bind(category)
        .execute(&mut *tx)
        .await?;
    let seeded = seed_defaults(&mut tx, Some(category)).await?;
    tx.commit().await?;

    settings_cache::invalidate().await;
    info!(category, seeded, "System settings category reset to defaults");
    Ok(seeded)
}

/// Seeds defaults for keys that do not exist yet; existing values are kept.
pub async fn ensure_defaults(pool: &MySqlPool) -> AppResult<()> {
    let existing: Vec<String> = sqlx::query_scalar("SELECT setting_key FROM system_settings")
        .fetch_all(pool)
        .await?;

    let missing: Vec<_> = default_settings()
        .into_iter()
        .filter(|d| !existing.iter().any(|k| k == d.key))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for default in &missing {
        upsert(
            &mut tx,
            default.key,
            &serialize_value(&default.value),
            default.kind,
            default.category,
            default.description,
            default.is_public,
        )
        .await?;
    }
    tx.commit().await?;

    settings_cache::invalidate().await;
    info!(count = missing.len(), "Seeded missing default settings");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExportedSetting {
    #[schema(example = "currency")]
    pub key: String,
    #[schema(example = "USD")]
    pub value: String,
    #[serde(rename = "type")]
    #[schema(example = "string")]
    pub setting_type: String,
    #[schema(example = "general")]
    pub category: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportSummary {
    pub imported_count: usize,
    pub skipped_count: usize,
}

pub async fn export_settings(pool: &MySqlPool) -> AppResult<Vec<ExportedSetting>> {
    Ok(snapshot(pool)
        .await?
        .iter()
        .map(|s| ExportedSetting {
            key: s.setting_key.clone(),
            value: s.value.clone(),
            setting_type: s.setting_type.clone(),
            category: s.category.clone(),
            description: s.description.clone(),
            is_public: s.is_public,
        })
        .collect())
}

pub async fn import_settings(
    pool: &MySqlPool,
    settings: &[ExportedSetting],
    overwrite_existing: bool,
) -> AppResult<ImportSummary> {
    let mut tx = pool.begin().await?;
    let mut summary = ImportSummary { imported_count: 0, skipped_count: 0 };

    for setting in settings {
        let kind: SettingType = setting.setting_type.parse().map_err(|_| {
            AppError::bad_request(format!(
                "Setting '{}' has unknown type '{}'",
                setting.key, setting.setting_type
            ))
        })?;

        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM system_settings WHERE setting_key = ?",
        )
        .bind(&setting.key)
        .fetch_one(&mut *tx)
        .await?
            > 0;

        if exists && !overwrite_existing {
            summary.skipped_count += 1;
            continue;
        }

        let description = setting
            .description
            .clone()
            .unwrap_or_else(|| describe_key(&setting.key));

        upsert(
            &mut tx,
            &setting.key,
            &setting.value,
            kind,
            &setting.category,
            &description,
            setting.is_public,
        )
        .await?;
        summary.imported_count += 1;
    }

    tx.commit().await?;
    settings_cache::invalidate().await;

    info!(
        imported = summary.imported_count,
        skipped = summary.skipped_count,
        "System settings imported"
    );
    Ok(summary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub checks: BTreeMap<String, HealthCheck>,
    #[schema(value_type = String, format = "date-time")]
    pub last_checked: chrono::DateTime<Utc>,
}

impl Default for HealthReport {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthReport {
    pub fn new() -> Self {
        Self {
            overall_status: HealthStatus::Healthy,
            checks: BTreeMap::new(),
            last_checked: Utc::now(),
        }
    }

    /// Records a check; the overall status is the worst one seen.
    pub fn record(&mut self, name: &str, status: HealthStatus, message: impl Into<String>) {
        self.overall_status = self.overall_status.max(status);
        self.checks.insert(
            name.to_string(),
            HealthCheck { status, message: message.into() },
        );
    }
}

pub async fn system_health(pool: &MySqlPool, log_dir: &str) -> HealthReport {
    let mut report = HealthReport::new();

    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => report.record("database", HealthStatus::Healthy, "Database connection successful"),
        Err(e) => report.record(
            "database",
            HealthStatus::Unhealthy,
            format!("Database connection failed: {}", e),
        ),
    }

    let marker = std::path::Path::new(log_dir).join(".health-check");
    let storage = std::fs::write(&marker, b"ok").and_then(|_| std::fs::remove_file(&marker));
    match storage {
        Ok(()) => report.record("storage", HealthStatus::Healthy, "Log directory is writable"),
        Err(e) => report.record(
            "storage",
            HealthStatus::Unhealthy,
            format!("Log directory is not writable: {}", e),
        ),
    }

    if settings_cache::round_trip().await {
        report.record("cache", HealthStatus::Healthy, "Cache is working properly");
    } else {
        report.record("cache", HealthStatus::Warning, "Cache value mismatch");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn existing_settings_keep_their_stored_type() {
        let existing = Some(("integer".to_string(), true));
        let (kind, is_public) = stored_kind(existing.clone(), &json!("12"));
        assert_eq!(kind, SettingType::Integer);
        assert!(is_public);
        assert!(validate_setting("pagination_size", kind, &json!("12")).is_err());

        let (kind, is_public) = stored_kind(None, &json!(true));
        assert_eq!(kind, SettingType::Boolean);
        assert!(!is_public);
    }

    fn setting(key: &str, value: &str, kind: &str, category: &str, is_public: bool) -> SystemSetting {
        SystemSetting {
            id: 1,
            setting_key: key.to_string(),
            value: value.to_string(),
            setting_type: kind.to_string(),
            category: category.to_string(),
            description: None,
            is_public,
            updated_at: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn groups_typed_values_by_category() {
        let rows = vec![
            setting("currency", "USD", "string", "general", true),
            setting("decimal_places", "2", "integer", "general", true),
            setting("two_factor_enabled", "false", "boolean", "security", false),
        ];

        let all = group(rows.iter());
        assert_eq!(all["general"]["decimal_places"], json!(2));
        assert_eq!(all["security"]["two_factor_enabled"], json!(false));

        let public = group(rows.iter().filter(|s| s.is_public));
        assert!(!public.contains_key("security"));
        assert_eq!(public["general"].len(), 2);
    }

    #[test]
    fn health_takes_the_worst_status() {
        let mut report = HealthReport::new();
        report.record("database", HealthStatus::Healthy, "ok");
        report.record("cache", HealthStatus::Warning, "slow");
        assert_eq!(report.overall_status, HealthStatus::Warning);

        report.record("storage", HealthStatus::Unhealthy, "down");
        report.record("disk", HealthStatus::Warning, "80%");
        assert_eq!(report.overall_status, HealthStatus::Unhealthy);
        assert_eq!(report.checks.len(), 4);
    }

    #[test]
    fn exported_settings_use_type_field() {
        let raw = json!({"key": "currency", "value": "EUR", "type": "string", "category": "general", "description": null});
        let parsed: ExportedSetting = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.setting_type, "string");
        assert!(!parsed.is_public);
    }
}
