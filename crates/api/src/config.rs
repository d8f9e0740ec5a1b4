use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use plume_core::sso::{DEFAULT_MAX_MEDIA_PRELOAD, DEFAULT_TEMP_TOKEN_TTL_SECS};

use crate::auth::jwt::JwtConfig;

/// A configuration value that is missing or cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Read `key` through `lookup` and parse it, falling back to `default` when unset.
pub(crate) fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// [`parse_or`] for values that must fall inside `range`.
pub(crate) fn parse_in_range<T, F>(
    lookup: &F,
    key: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: format!("must be between {} and {}", range.start(), range.end()),
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except
/// `JWT_SECRET`, which must always be provided.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after shutdown starts (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Public base URL of the web app; `login_url` values point here.
    pub public_url: String,
    /// Bearer key for the product administration API. Unset disables it.
    pub admin_api_key: Option<String>,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// Handoff limits and cleanup schedule.
    pub sso: SsoConfig,
}

/// Ten years.
const MAX_RETENTION_HOURS: i64 = 10 * 365 * 24;

/// Settings of the SSO handoff flow.
#[derive(Debug, Clone)]
pub struct SsoConfig {
    /// Lifetime of a temporary token in seconds.
    pub temp_token_ttl_secs: i64,
    /// Maximum number of media items accepted in one preload.
    pub max_media_preload: usize,
    /// Accept plain `http` redirects to loopback hosts.
    pub allow_insecure_localhost: bool,
    /// Seconds between cleanup runs.
    pub cleanup_interval_secs: u64,
    /// Hours ended tokens and sessions are kept before deletion.
    pub retention_hours: i64,
}

impl SsoConfig {
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `SSO_TEMP_TOKEN_TTL_SECS`      | `120`   |
    /// | `SSO_MAX_MEDIA_PRELOAD`        | `50`    |
    /// | `SSO_ALLOW_INSECURE_LOCALHOST` | `true`  |
    /// | `SSO_CLEANUP_INTERVAL_SECS`    | `3600`  |
    /// | `SSO_RETENTION_HOURS`          | `24`    |
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let temp_token_ttl_secs = parse_in_range(
            lookup,
            "SSO_TEMP_TOKEN_TTL_SECS",
            DEFAULT_TEMP_TOKEN_TTL_SECS,
            1..=3600,
        )?;
        let cleanup_interval_secs =
            parse_in_range(lookup, "SSO_CLEANUP_INTERVAL_SECS", 3600u64, 1..=7 * 24 * 3600)?;
        let retention_hours =
            parse_in_range(lookup, "SSO_RETENTION_HOURS", 24i64, 0..=MAX_RETENTION_HOURS)?;

        Ok(Self {
            temp_token_ttl_secs,
            max_media_preload: parse_or(lookup, "SSO_MAX_MEDIA_PRELOAD", DEFAULT_MAX_MEDIA_PRELOAD)?,
            allow_insecure_localhost: parse_or(lookup, "SSO_ALLOW_INSECURE_LOCALHOST", true)?,
            cleanup_interval_secs,
            retention_hours,
        })
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `PUBLIC_URL`           | `http://localhost:5173`    |
    /// | `ADMIN_API_KEY`        | unset                      |
    ///
    /// See [`JwtConfig::from_lookup`] and [`SsoConfig::from_lookup`] for the rest.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Same as [`ServerConfig::from_env`] but reading through `lookup`.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(lookup, "PORT", 3000u16)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_or(lookup, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = parse_or(lookup, "SHUTDOWN_TIMEOUT_SECS", 30u64)?;

        let public_url = lookup("PUBLIC_URL")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .trim_end_matches('/')
            .to_string();

        let admin_api_key = lookup("ADMIN_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            public_url,
            admin_api_key,
            jwt: JwtConfig::from_lookup(lookup)?,
            sso: SsoConfig::from_lookup(lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = ServerConfig::from_lookup(&lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.public_url, "http://localhost:5173");
        assert!(config.admin_api_key.is_none());
        assert_eq!(config.jwt.access_token_expiry_mins, 15);
        assert_eq!(config.jwt.refresh_token_expiry_days, 7);
        assert_eq!(config.sso.temp_token_ttl_secs, 120);
        assert_eq!(config.sso.max_media_preload, 50);
        assert!(config.sso.allow_insecure_localhost);
        assert_eq!(config.sso.cleanup_interval_secs, 3600);
        assert_eq!(config.sso.retention_hours, 24);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let result = ServerConfig::from_lookup(&lookup_from(&[]));
        assert_matches!(result, Err(ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn malformed_number_names_the_key() {
        let lookup = lookup_from(&[("JWT_SECRET", "s3cret"), ("PORT", "eighty")]);
        let result = ServerConfig::from_lookup(&lookup);
        assert_matches!(result, Err(ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn malformed_bool_is_rejected() {
        let lookup = lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("SSO_ALLOW_INSECURE_LOCALHOST", "yes"),
        ]);
        let result = ServerConfig::from_lookup(&lookup);
        assert_matches!(
            result,
            Err(ConfigError::Invalid { key: "SSO_ALLOW_INSECURE_LOCALHOST", .. })
        );
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let lookup = lookup_from(&[("JWT_SECRET", "s3cret"), ("SSO_TEMP_TOKEN_TTL_SECS", "0")]);
        assert!(ServerConfig::from_lookup(&lookup).is_err());
    }

    #[test]
    fn out_of_range_durations_are_rejected() {
        for (key, value) in [
            ("SSO_TEMP_TOKEN_TTL_SECS", "-5"),
            ("SSO_CLEANUP_INTERVAL_SECS", "0"),
            ("SSO_RETENTION_HOURS", "-1"),
            ("SSO_RETENTION_HOURS", "9223372036854775807"),
            ("JWT_ACCESS_EXPIRY_MINS", "0"),
            ("JWT_ACCESS_EXPIRY_MINS", "9223372036854775807"),
            ("JWT_REFRESH_EXPIRY_DAYS", "-3"),
            ("JWT_REFRESH_EXPIRY_DAYS", "1000000000000"),
        ] {
            let lookup = lookup_from(&[("JWT_SECRET", "s3cret"), (key, value)]);
            let result = ServerConfig::from_lookup(&lookup);
            assert_matches!(
                result,
                Err(ConfigError::Invalid { key: k, .. }) if k == key,
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn zero_retention_is_allowed() {
        let lookup = lookup_from(&[("JWT_SECRET", "s3cret"), ("SSO_RETENTION_HOURS", "0")]);
        let config = ServerConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.sso.retention_hours, 0);
    }

    #[test]
    fn overrides_are_trimmed_and_split() {
        let lookup = lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("CORS_ORIGINS", "https://a.example.com, https://b.example.com,"),
            ("PUBLIC_URL", "https://app.example.com/"),
            ("ADMIN_API_KEY", "  "),
            ("SSO_MAX_MEDIA_PRELOAD", "10"),
        ]);
        let config = ServerConfig::from_lookup(&lookup).unwrap();

        assert_eq!(
            config.cors_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert_eq!(config.public_url, "https://app.example.com");
        assert!(config.admin_api_key.is_none(), "blank admin key disables the admin API");
        assert_eq!(config.sso.max_media_preload, 10);
    }
}
