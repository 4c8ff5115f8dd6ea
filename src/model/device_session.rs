use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DeviceSession {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "Pixel 8")]
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    #[schema(example = "10.0.0.12")]
    pub ip_address: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub last_active_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub revoked_at: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// Short device label from a user agent when the client did not name itself.
pub fn device_label(device_name: Option<&str>, user_agent: Option<&str>) -> Option<String> {
    if let Some(name) = device_name.map(str::trim).filter(|n| !n.is_empty()) {
        return Some(name.chars().take(100).collect());
    }

    let ua = user_agent?;
    let label = ["Android", "iPhone", "iPad", "Windows", "Macintosh", "Linux"]
        .into_iter()
        .find(|platform| ua.contains(platform))
        .unwrap_or("Unknown device");
    Some(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_name_wins() {
        assert_eq!(device_label(Some(" Site tablet "), Some("Android")), Some("Site tablet".to_string()));
    }

    #[test]
    fn falls_back_to_platform() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        assert_eq!(device_label(None, Some(ua)), Some("iPhone".to_string()));
        assert_eq!(device_label(Some(""), Some("curl/8.0")), Some("Unknown device".to_string()));
        assert_eq!(device_label(None, None), None);
    }
}
