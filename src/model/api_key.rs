use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

pub const KEY_PREFIX: &str = "hrk";
const PREFIX_BYTES: usize = 4;
const SECRET_BYTES: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ApiKey {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "Mobile sync")]
    pub name: String,
    #[schema(example = "a1b2c3d4")]
    pub key_prefix: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    #[schema(example = "read,write", nullable = true)]
    pub scopes: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_used_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub revoked_at: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl ApiKey {
    pub fn is_usable(&self, now: NaiveDateTime) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|exp| exp > now)
    }

    pub fn scope_list(&self) -> Vec<ApiScope> {
        parse_scopes(self.scopes.as_deref())
    }
}

/// Access granted to an API key. Bearer tokens are never scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApiScope {
    Read,
    Write,
    Admin,
}

impl ApiScope {
    /// Admin implies write.
    pub fn allows_writes(scopes: &[ApiScope]) -> bool {
        scopes.iter().any(|s| matches!(s, ApiScope::Write | ApiScope::Admin))
    }
}

/// Stored comma list to scopes; unknown entries are dropped and an empty list is read-only.
pub fn parse_scopes(stored: Option<&str>) -> Vec<ApiScope> {
    let mut scopes: Vec<ApiScope> = stored
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| ApiScope::from_str(s.trim()).ok())
        .collect();
    scopes.dedup();
    if scopes.is_empty() {
        scopes.push(ApiScope::Read);
    }
    scopes
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generates a fresh key; returns `(plaintext, lookup prefix)`.
pub fn generate_key() -> (String, String) {
    let prefix = random_hex(PREFIX_BYTES);
    let secret = random_hex(SECRET_BYTES);
    (format!("{}_{}_{}", KEY_PREFIX, prefix, secret), prefix)
}

/// Extracts the lookup prefix from a presented key, rejecting anything malformed.
pub fn parse_key(key: &str) -> Option<&str> {
    let mut parts = key.trim().splitn(3, '_');
    let (tag, prefix, secret) = (parts.next()?, parts.next()?, parts.next()?);

    let is_hex = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit());

    if tag == KEY_PREFIX && is_hex(prefix, PREFIX_BYTES * 2) && is_hex(secret, SECRET_BYTES * 2) {
        Some(prefix)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_parse_back_to_their_prefix() {
        let (key, prefix) = generate_key();
        assert!(key.starts_with("hrk_"));
        assert_eq!(parse_key(&key), Some(prefix.as_str()));
    }

    #[test]
    fn stored_scopes_parse_leniently() {
        assert_eq!(parse_scopes(Some("read, write")), vec![ApiScope::Read, ApiScope::Write]);
        assert_eq!(parse_scopes(Some("timesheets:read")), vec![ApiScope::Read]);
        assert_eq!(parse_scopes(None), vec![ApiScope::Read]);
        assert!(!ApiScope::allows_writes(&parse_scopes(None)));
        assert!(ApiScope::allows_writes(&[ApiScope::Admin]));
    }

    #[test]
    fn keys_are_unique() {
        assert_ne!(generate_key().0, generate_key().0);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("hrk_abc"), None);
        assert_eq!(parse_key("xyz_a1b2c3d4_00112233445566778899aabbccddeeff"), None);
        assert_eq!(parse_key("hrk_a1b2c3d4_0011"), None);
        assert_eq!(
            parse_key("hrk_a1b2c3d4_00112233445566778899aabbccddeeff"),
            Some("a1b2c3d4")
        );
    }
}
