use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub log_dir: String,

    /// Hours per day counted as regular time before overtime kicks in
    pub regular_hours_limit: f64,
    pub settings_cache_ttl: u64,
    /// Share of basic salary an employee may have outstanding as advances
    pub advance_salary_ratio: f64,
}

/// Reads optional variables, remembering the malformed ones so they can be logged
/// once the subscriber is installed.
#[derive(Default)]
struct EnvReader {
    warnings: Vec<String>,
}

impl EnvReader {
    /// Falls back to `default` when the variable is unset or malformed.
    fn var_or<T: FromStr>(&mut self, key: &str, default: T) -> T {
        match env::var(key) {
            Ok(raw) => match raw.trim().parse() {
                Ok(v) => v,
                Err(_) => {
                    self.warnings
                        .push(format!("Malformed config value {}={:?}, using default", key, raw));
                    default
                }
            },
            Err(_) => default,
        }
    }
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{} must be set", key))
}

impl Config {
    /// Loads `.env` and the environment; the second value lists malformed optional variables.
    pub fn from_env() -> (Self, Vec<String>) {
        dotenv().ok();
        let mut reader = EnvReader::default();

        let config = Self {
            server_addr: required("SERVER_ADDR"),
            database_url: required("DATABASE_URL"),
            jwt_secret: required("JWT_SECRET"),
            access_token_ttl: reader.var_or("ACCESS_TOKEN_TTL", 900), // 15 min
            refresh_token_ttl: reader.var_or("REFRESH_TOKEN_TTL", 604_800), // 7 days

            rate_login_per_min: reader.var_or("RATE_LOGIN_PER_MIN", 60),
            rate_register_per_min: reader.var_or("RATE_REGISTER_PER_MIN", 30),
            rate_refresh_per_min: reader.var_or("RATE_REFRESH_PER_MIN", 30),
            rate_protected_per_min: reader.var_or("RATE_PROTECTED_PER_MIN", 1000),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            db_max_connections: reader.var_or("DB_MAX_CONNECTIONS", 10),
            run_migrations: reader.var_or("RUN_MIGRATIONS", true),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            regular_hours_limit: reader.var_or("REGULAR_HOURS_LIMIT", 8.0),
            settings_cache_ttl: reader.var_or("SETTINGS_CACHE_TTL", 3600),
            advance_salary_ratio: reader.var_or("ADVANCE_SALARY_RATIO", 0.5),
        };

        (config, reader.warnings)
    }

    /// Configuration used by unit tests; never touches the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/erp_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_register_per_min: 30,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            db_max_connections: 1,
            run_migrations: false,
            log_dir: "logs".to_string(),
            regular_hours_limit: 8.0,
            settings_cache_ttl: 60,
            advance_salary_ratio: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_optional_value_falls_back_to_default() {
        // SAFETY: tests in this module are the only writers of this key
        unsafe { env::set_var("ERP_TEST_MALFORMED_TTL", "not-a-number") };
        let mut reader = EnvReader::default();
        assert_eq!(reader.var_or("ERP_TEST_MALFORMED_TTL", 42usize), 42);
        unsafe { env::remove_var("ERP_TEST_MALFORMED_TTL") };

        assert_eq!(reader.warnings.len(), 1);
        assert!(reader.warnings[0].contains("ERP_TEST_MALFORMED_TTL"));
    }

    #[test]
    fn unset_optional_value_uses_default() {
        let mut reader = EnvReader::default();
        assert_eq!(reader.var_or("ERP_TEST_DEFINITELY_UNSET", 7u32), 7);
        assert!(reader.var_or("ERP_TEST_DEFINITELY_UNSET_BOOL", true));
        assert!(reader.warnings.is_empty());
    }
}
