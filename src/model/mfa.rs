use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::NaiveDateTime;
use serde::Serialize;
use totp_rs::{Algorithm, Secret, TOTP};

pub const BACKUP_CODE_COUNT: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const TOTP_ISSUER: &str = "ERP";
const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
/// Steps of clock drift accepted either side of now
const TOTP_SKEW: u8 = 1;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MfaConfig {
    pub id: u64,
    pub user_id: u64,
    pub method: String,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    #[serde(skip_serializing)]
    pub last_totp_step: Option<u64>,
    pub is_active: bool,
    pub enabled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MfaBackupCode {
    pub id: u64,
    pub code_hash: String,
}

/// One backup code, formatted `XXXX-XXXX` from an unambiguous alphabet.
pub fn generate_backup_code() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);

    let chars: String = bytes
        .iter()
        .map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char)
        .collect();
    format!("{}-{}", &chars[..4], &chars[4..])
}

/// Canonical form a user-typed code is compared in.
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Authenticator for `account`, from a base32 secret or a freshly generated one.
pub fn build_totp(secret_base32: Option<&str>, account: &str) -> Result<TOTP, String> {
    let secret = match secret_base32 {
        Some(encoded) => Secret::Encoded(encoded.to_string()),
        None => Secret::generate_secret(),
    };
    let bytes = secret.to_bytes().map_err(|e| format!("invalid TOTP secret: {:?}", e))?;

    // the otpauth label uses ':' as its separator
    let account = account.replace(':', "_");
    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP,
        bytes,
        Some(TOTP_ISSUER.to_string()),
        account,
    )
    .map_err(|e| format!("invalid TOTP parameters: {:?}", e))
}

/// Time step whose code equals `code`, searching the accepted drift window around `unix_time`.
pub fn matching_totp_step(totp: &TOTP, code: &str, unix_time: u64) -> Option<u64> {
    let digits: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != TOTP_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let now_step = unix_time / TOTP_STEP;
    let skew = u64::from(TOTP_SKEW);
    (now_step.saturating_sub(skew)..=now_step + skew).find(|step| totp.generate(step * TOTP_STEP) == digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_codes_have_fixed_shape() {
        let code = generate_backup_code();
        assert_eq!(code.len(), 9);
        assert_eq!(&code[4..5], "-");
        assert!(normalize_code(&code).bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn normalization_ignores_case_and_separators() {
        assert_eq!(normalize_code("ab3d-ef7h"), "AB3DEF7H");
        assert_eq!(normalize_code(" AB3D EF7H "), "AB3DEF7H");
    }

    #[test]
    fn totp_codes_match_within_the_drift_window() {
        let totp = build_totp(None, "jdoe").unwrap();
        let now = 1_760_000_000;
        let code = totp.generate(now);

        assert_eq!(matching_totp_step(&totp, &code, now), Some(now / TOTP_STEP));
        assert_eq!(matching_totp_step(&totp, &code, now + TOTP_STEP), Some(now / TOTP_STEP));
        assert_eq!(matching_totp_step(&totp, &code, now + 5 * TOTP_STEP), None);
        assert_eq!(matching_totp_step(&totp, "12345", now), None);
        assert_eq!(matching_totp_step(&totp, "K3P9-2XQM", now), None);
    }

    #[test]
    fn stored_secret_rebuilds_the_same_authenticator() {
        let enrolled = build_totp(None, "hr:admin").unwrap();
        let secret = enrolled.get_secret_base32();
        let rebuilt = build_totp(Some(&secret), "hr:admin").unwrap();

        assert_eq!(rebuilt.generate(1_760_000_000), enrolled.generate(1_760_000_000));
        let url = rebuilt.get_url();
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("issuer=ERP"));
        assert!(!rebuilt.get_qr_base64().unwrap().is_empty());
    }
}
