use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
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
    pub log_level: tracing::Level,

    // GPS punches
    pub location_max_age_secs: i64,
    pub location_max_skew_secs: i64,

    // Daily absence marking
    pub absent_job_enabled: bool,
    pub absent_job_time: NaiveTime,

    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        let absent_job_time = lookup("ABSENT_JOB_TIME").unwrap_or_else(|| "23:59".to_string());
        let absent_job_time = NaiveTime::parse_from_str(&absent_job_time, "%H:%M")
            .with_context(|| format!("ABSENT_JOB_TIME must be HH:MM, got {absent_job_time}"))?;

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_USERNAME"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => {
                Some((u.trim().to_string(), p))
            }
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse_or(&lookup, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_or(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parse_or(&lookup, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,
            log_level: parse_or(&lookup, "LOG_LEVEL", tracing::Level::DEBUG)?,

            location_max_age_secs: parse_or(&lookup, "LOCATION_MAX_AGE_SECS", 60)?,
            location_max_skew_secs: parse_or(&lookup, "LOCATION_MAX_SKEW_SECS", 10)?,

            absent_job_enabled: parse_or(&lookup, "ABSENT_JOB_ENABLED", true)?,
            absent_job_time,

            bootstrap_admin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid value for {key} ({raw}): {e}")),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "SERVER_ADDR" => Some("127.0.0.1:0".to_string()),
        "DATABASE_URL" => Some("mysql://root@localhost/civildesk_test".to_string()),
        "JWT_SECRET" => Some("test-secret".to_string()),
        _ => None,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://root@localhost/civildesk"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply_when_optional_keys_missing() {
        let cfg = Config::from_lookup(lookup_from(&BASE)).unwrap();
        assert_eq!(cfg.access_token_ttl, 900);
        assert_eq!(cfg.refresh_token_ttl, 604_800);
        assert_eq!(cfg.api_prefix, "/api");
        assert_eq!(cfg.location_max_age_secs, 60);
        assert_eq!(cfg.location_max_skew_secs, 10);
        assert_eq!(cfg.absent_job_time, NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        assert_eq!(cfg.log_level, tracing::Level::DEBUG);
        assert!(cfg.run_migrations);
        assert!(cfg.bootstrap_admin.is_none());
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let err = Config::from_lookup(lookup_from(&BASE[..2])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let mut pairs = BASE.to_vec();
        pairs.push(("RATE_LOGIN_PER_MIN", "lots"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn overrides_and_bootstrap_admin() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("ABSENT_JOB_TIME", "22:30"),
            ("LOG_LEVEL", "info"),
            ("BOOTSTRAP_ADMIN_USERNAME", " admin "),
            ("BOOTSTRAP_ADMIN_PASSWORD", "changeme"),
        ]);
        let cfg = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(cfg.absent_job_time, NaiveTime::from_hms_opt(22, 30, 0).unwrap());
        assert_eq!(cfg.log_level, tracing::Level::INFO);
        assert_eq!(
            cfg.bootstrap_admin,
            Some(("admin".to_string(), "changeme".to_string()))
        );
    }
}
