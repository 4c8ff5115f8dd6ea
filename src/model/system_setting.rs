use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemSetting {
    pub id: u64,
    pub setting_key: String,
    pub value: String,
    pub setting_type: String,
    pub category: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub updated_at: NaiveDateTime,
}

impl SystemSetting {
    pub fn typed_value(&self) -> Value {
        let kind = self.setting_type.parse().unwrap_or(SettingType::String);
        kind.cast(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SettingType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Json,
}

impl SettingType {
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => SettingType::Boolean,
            Value::Number(n) if n.is_f64() => SettingType::Float,
            Value::Number(_) => SettingType::Integer,
            Value::Array(_) => SettingType::Array,
            Value::Object(_) => SettingType::Json,
            Value::String(_) | Value::Null => SettingType::String,
        }
    }

    /// Turns a stored text value back into JSON of this type.
    pub fn cast(self, raw: &str) -> Value {
        match self {
            SettingType::Boolean => Value::Bool(matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )),
            SettingType::Integer => json!(raw.trim().parse::<i64>().unwrap_or(0)),
            SettingType::Float => json!(raw.trim().parse::<f64>().unwrap_or(0.0)),
            SettingType::Array | SettingType::Json => serde_json::from_str(raw).unwrap_or(Value::Null),
            SettingType::String => Value::String(raw.to_string()),
        }
    }
}

impl SettingType {
    /// Whether `value` can be stored under this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            SettingType::Boolean => value.is_boolean(),
            SettingType::Integer => value.is_i64() || value.is_u64(),
            SettingType::Float => value.is_number(),
            SettingType::String => value.is_string(),
            SettingType::Array | SettingType::Json => value.is_array() || value.is_object(),
        }
    }
}

const FREQUENCIES: [&str; 4] = ["hourly", "daily", "weekly", "monthly"];

fn integer_bounds(key: &str) -> (i64, i64) {
    match key {
        "pagination_size" => (1, 100),
        "session_timeout" => (5, 1440),
        "lockout_duration" => (1, 1440),
        "password_min_length" => (4, 128),
        "max_login_attempts" => (1, 20),
        "cache_ttl" => (60, 86_400),
        "max_file_upload_size" => (1024, 102_400),
        "decimal_places" => (0, 8),
        k if k.contains("_days") => (1, 365),
        _ => (0, i64::MAX),
    }
}

fn check_string(key: &str, text: &str) -> Result<(), String> {
    let max_len = match key {
        "currency" => {
            if text.len() != 3 || !text.chars().all(|c| c.is_ascii_uppercase()) {
                return Err("must be a three-letter upper-case currency code".to_string());
            }
            3
        }
        "default_language" => {
            if text.len() != 2 || !text.chars().all(|c| c.is_ascii_lowercase()) {
                return Err("must be a two-letter lower-case language code".to_string());
            }
            2
        }
        "backup_frequency" | "digest_frequency" => {
            if !FREQUENCIES.contains(&text) {
                return Err(format!("must be one of {}", FREQUENCIES.join(", ")));
            }
            7
        }
        "app_name" => 100,
        "app_description" => 500,
        "maintenance_message" => 1000,
        _ => 255,
    };

    if text.chars().count() > max_len {
        return Err(format!("must not exceed {} characters", max_len));
    }
    Ok(())
}

/// Checks a value against the type its setting is stored with and the bounds of known keys.
pub fn validate_setting(key: &str, kind: SettingType, value: &Value) -> Result<(), String> {
    if !kind.accepts(value) {
        return Err(format!("must be of type {}", kind));
    }

    match kind {
        SettingType::Integer => {
            let (min, max) = integer_bounds(key);
            match value.as_i64() {
                Some(n) if (min..=max).contains(&n) => Ok(()),
                _ if max == i64::MAX => Err(format!("must be at least {}", min)),
                _ => Err(format!("must be between {} and {}", min, max)),
            }
        }
        SettingType::Float => {
            let n = value.as_f64().unwrap_or(-1.0);
            if key.contains("rate") || key.contains("percentage") {
                if (0.0..=100.0).contains(&n) { Ok(()) } else { Err("must be between 0 and 100".to_string()) }
            } else if n < 0.0 {
                Err("must not be negative".to_string())
            } else {
                Ok(())
            }
        }
        SettingType::String => check_string(key, value.as_str().unwrap_or_default()),
        _ => Ok(()),
    }
}

/// Text form a JSON value is stored as.
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// `max_login_attempts` -> `Max Login Attempts`
pub fn describe_key(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct DefaultSetting {
    pub category: &'static str,
    pub key: &'static str,
    pub value: Value,
    pub kind: SettingType,
    pub description: &'static str,
    pub is_public: bool,
}

fn def(category: &'static str, key: &'static str, value: Value, description: &'static str, is_public: bool) -> DefaultSetting {
    DefaultSetting {
        category,
        key,
        kind: SettingType::infer(&value),
        value,
        description,
        is_public,
    }
}

pub const CATEGORIES: [&str; 5] = ["general", "security", "performance", "notifications", "maintenance"];

pub fn default_settings() -> Vec<DefaultSetting> {
    vec![
        def("general", "app_name", json!("SND Rental Management"), "Application name", true),
        def("general", "app_description", json!("Complete rental management solution"), "Application description", true),
        def("general", "default_timezone", json!("UTC"), "Default timezone", true),
        def("general", "default_language", json!("en"), "Default language", true),
        def("general", "date_format", json!("Y-m-d"), "Date format", true),
        def("general", "time_format", json!("H:i:s"), "Time format", true),
        def("general", "currency", json!("USD"), "Default currency", true),
        def("general", "decimal_places", json!(2), "Decimal places for currency", true),
        def("security", "session_timeout", json!(120), "Session timeout in minutes", false),
        def("security", "password_min_length", json!(8), "Minimum password length", false),
        def("security", "password_require_uppercase", json!(true), "Require uppercase letters in password", false),
        def("security", "password_require_lowercase", json!(true), "Require lowercase letters in password", false),
        def("security", "password_require_numbers", json!(true), "Require numbers in password", false),
        def("security", "password_require_symbols", json!(false), "Require symbols in password", false),
        def("security", "max_login_attempts", json!(5), "Maximum login attempts before lockout", false),
        def("security", "lockout_duration", json!(15), "Lockout duration in minutes", false),
        def("security", "two_factor_enabled", json!(false), "Enable two-factor authentication", false),
        def("performance", "cache_enabled", json!(true), "Enable application caching", false),
        def("performance", "cache_ttl", json!(3600), "Default cache TTL in seconds", false),
        def("performance", "query_cache_enabled", json!(true), "Enable database query caching", false),
        def("performance", "compression_enabled", json!(true), "Enable response compression", false),
        def("performance", "lazy_loading_enabled", json!(true), "Enable lazy loading for relationships", false),
        def("performance", "pagination_size", json!(15), "Default pagination size", false),
        def("performance", "max_file_upload_size", json!(10240), "Maximum file upload size in KB", false),
        def("performance", "image_optimization_enabled", json!(true), "Enable automatic image optimization", false),
        def("notifications", "email_notifications_enabled", json!(true), "Enable email notifications", false),
        def("notifications", "sms_notifications_enabled", json!(false), "Enable SMS notifications", false),
        def("notifications", "push_notifications_enabled", json!(true), "Enable push notifications", false),
        def("notifications", "notification_queue_enabled", json!(true), "Enable notification queueing", false),
        def("notifications", "digest_notifications_enabled", json!(true), "Enable digest notifications", false),
        def("notifications", "digest_frequency", json!("daily"), "Digest notification frequency", false),
        def("notifications", "notification_retention_days", json!(30), "Notification retention period in days", false),
        def("maintenance", "maintenance_mode_enabled", json!(false), "Enable maintenance mode", false),
        def(
            "maintenance",
            "maintenance_message",
            json!("System is under maintenance. Please try again later."),
            "Maintenance mode message",
            false,
        ),
        def("maintenance", "auto_backup_enabled", json!(true), "Enable automatic backups", false),
        def("maintenance", "backup_frequency", json!("daily"), "Backup frequency", false),
        def("maintenance", "backup_retention_days", json!(30), "Backup retention period in days", false),
        def("maintenance", "log_cleanup_enabled", json!(true), "Enable automatic log cleanup", false),
        def("maintenance", "log_retention_days", json!(7), "Log retention period in days", false),
        def("maintenance", "temp_file_cleanup_enabled", json!(true), "Enable automatic temporary file cleanup", false),
    ]
}

/// Password rules taken from the `security` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_symbols: false,
        }
    }
}

impl PasswordPolicy {
    /// Returns every rule the password breaks.
    pub fn violations(&self, password: &str) -> Vec<String> {
        let mut broken = Vec::new();

        if password.chars().count() < self.min_length {
            broken.push(format!("must be at least {} characters", self.min_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            broken.push("must contain an uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            broken.push("must contain a lowercase letter".to_string());
        }
        if self.require_numbers && !password.chars().any(|c| c.is_ascii_digit()) {
            broken.push("must contain a number".to_string());
        }
        if self.require_symbols && password.chars().all(|c| c.is_alphanumeric()) {
            broken.push("must contain a symbol".to_string());
        }

        broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_types_from_json() {
        assert_eq!(SettingType::infer(&json!(true)), SettingType::Boolean);
        assert_eq!(SettingType::infer(&json!(15)), SettingType::Integer);
        assert_eq!(SettingType::infer(&json!(1.5)), SettingType::Float);
        assert_eq!(SettingType::infer(&json!(["a"])), SettingType::Array);
        assert_eq!(SettingType::infer(&json!({"a": 1})), SettingType::Json);
        assert_eq!(SettingType::infer(&json!("daily")), SettingType::String);
    }

    #[test]
    fn stored_text_casts_back() {
        assert_eq!(SettingType::Boolean.cast(&serialize_value(&json!(false))), json!(false));
        assert_eq!(SettingType::Boolean.cast("1"), json!(true));
        assert_eq!(SettingType::Integer.cast("120"), json!(120));
        assert_eq!(SettingType::Integer.cast("abc"), json!(0));
        assert_eq!(SettingType::Array.cast(&serialize_value(&json!(["x", "y"]))), json!(["x", "y"]));
        assert_eq!(SettingType::String.cast("Y-m-d"), json!("Y-m-d"));
    }

    #[test]
    fn values_must_match_the_stored_type() {
        assert!(validate_setting("cache_enabled", SettingType::Boolean, &json!(false)).is_ok());
        assert!(validate_setting("cache_enabled", SettingType::Boolean, &json!("false")).is_err());
        assert!(validate_setting("pagination_size", SettingType::Integer, &json!(2.5)).is_err());
        assert!(validate_setting("app_name", SettingType::String, &json!(12)).is_err());
        assert!(validate_setting("app_name", SettingType::String, &Value::Null).is_err());
        assert!(validate_setting("tags", SettingType::Array, &json!(["a"])).is_ok());
    }

    #[test]
    fn known_keys_are_range_checked() {
        assert!(validate_setting("password_min_length", SettingType::Integer, &json!(4)).is_ok());
        assert!(validate_setting("password_min_length", SettingType::Integer, &json!(128)).is_ok());
        assert!(validate_setting("password_min_length", SettingType::Integer, &json!(3)).is_err());
        assert!(validate_setting("password_min_length", SettingType::Integer, &json!(129)).is_err());
        assert!(validate_setting("pagination_size", SettingType::Integer, &json!(0)).is_err());
        assert!(validate_setting("pagination_size", SettingType::Integer, &json!(100)).is_ok());
        assert!(validate_setting("pagination_size", SettingType::Integer, &json!(101)).is_err());
        assert!(validate_setting("session_timeout", SettingType::Integer, &json!(4)).is_err());
        assert!(validate_setting("lockout_duration", SettingType::Integer, &json!(1)).is_ok());
        assert!(validate_setting("log_retention_days", SettingType::Integer, &json!(400)).is_err());
        assert!(validate_setting("some_counter", SettingType::Integer, &json!(-1)).is_err());
    }

    #[test]
    fn known_strings_are_format_checked() {
        assert!(validate_setting("currency", SettingType::String, &json!("EUR")).is_ok());
        assert!(validate_setting("currency", SettingType::String, &json!("eur")).is_err());
        assert!(validate_setting("default_language", SettingType::String, &json!("de")).is_ok());
        assert!(validate_setting("digest_frequency", SettingType::String, &json!("yearly")).is_err());
        assert!(validate_setting("app_name", SettingType::String, &json!("x".repeat(101))).is_err());
    }

    #[test]
    fn describes_keys_in_title_case() {
        assert_eq!(describe_key("max_login_attempts"), "Max Login Attempts");
        assert_eq!(describe_key("currency"), "Currency");
    }

    #[test]
    fn defaults_cover_every_category_with_unique_keys() {
        let defaults = default_settings();
        for category in CATEGORIES {
            assert!(defaults.iter().any(|d| d.category == category), "{} has no defaults", category);
        }

        let mut keys: Vec<_> = defaults.iter().map(|d| d.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), defaults.len());
    }

    #[test]
    fn password_policy_lists_violations() {
        let policy = PasswordPolicy::default();
        assert!(policy.violations("Str0ngPass").is_empty());
        assert_eq!(policy.violations("weak").len(), 3);

        let strict = PasswordPolicy { require_symbols: true, ..PasswordPolicy::default() };
        assert_eq!(strict.violations("Str0ngPass"), vec!["must contain a symbol".to_string()]);
    }
}
