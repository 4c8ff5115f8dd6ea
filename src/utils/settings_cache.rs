use crate::model::system_setting::SystemSetting;
use anyhow::Result;
use moka::future::Cache;
use once_cell::sync::OnceCell;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

const ALL_SETTINGS: &str = "settings:all";
const HEALTH_KEY: &str = "settings:health-check";
const DEFAULT_TTL_SECS: u64 = 3600;

pub type SettingsSnapshot = Arc<Vec<SystemSetting>>;

static SETTINGS_CACHE: OnceCell<Cache<String, SettingsSnapshot>> = OnceCell::new();

fn build(ttl_secs: u64) -> Cache<String, SettingsSnapshot> {
    Cache::builder()
        .max_capacity(16)
        .time_to_live(Duration::from_secs(ttl_secs.max(1)))
        .build()
}

/// Sets the TTL; only the first call has an effect.
pub fn init(ttl_secs: u64) {
    let _ = SETTINGS_CACHE.set(build(ttl_secs));
}

fn cache() -> &'static Cache<String, SettingsSnapshot> {
    SETTINGS_CACHE.get_or_init(|| build(DEFAULT_TTL_SECS))
}

async fn load(pool: &MySqlPool) -> Result<SettingsSnapshot, sqlx::Error> {
    let rows = sqlx::query_as::<_, SystemSetting>(
        r#"
        SELECT id, setting_key, value, setting_type, category, description, is_public, updated_at
        FROM system_settings
        ORDER BY category, setting_key
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(Arc::new(rows))
}

/// Every setting row, loaded from the database at most once per TTL.
pub async fn all_settings(pool: &MySqlPool) -> Result<SettingsSnapshot, Arc<sqlx::Error>> {
    cache()
        .try_get_with(ALL_SETTINGS.to_string(), load(pool))
        .await
}

pub async fn invalidate() {
    cache().invalidate(ALL_SETTINGS).await;
}

/// Writes and reads back a marker entry.
pub async fn round_trip() -> bool {
    let marker: SettingsSnapshot = Arc::new(Vec::new());
    cache().insert(HEALTH_KEY.to_string(), marker.clone()).await;
    let found = cache()
        .get(HEALTH_KEY)
        .await
        .is_some_and(|cached| Arc::ptr_eq(&cached, &marker));
    cache().invalidate(HEALTH_KEY).await;
    found
}

pub async fn warmup_settings_cache(pool: &MySqlPool) -> Result<()> {
    let settings = all_settings(pool)
        .await
        .map_err(|e| anyhow::anyhow!("settings load failed: {}", e))?;

    log::info!("Settings cache warmup complete: {} settings", settings.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn health_entry_round_trips() {
        assert!(round_trip().await);
        assert!(cache().get(HEALTH_KEY).await.is_none());
    }
}
