//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SOKO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SOKO_DB_MAX_CONNECTIONS` - Pool size ceiling (default: 10)
//! - `SOKO_DB_MIN_CONNECTIONS` - Idle connections kept open (default: 2)
//! - `SOKO_DB_ACQUIRE_TIMEOUT_SECS` - Wait for a pooled connection (default: 10)
//! - `SOKO_DB_STATEMENT_TIMEOUT_MS` - Per-statement server timeout (default: 5000)
//! - `SOKO_AVAILABLE_RIDES_LIMIT` - Pending rides shown to a driver (default: 10)
//! - `SOKO_RESERVATION_TTL_SECS` - Age after which held stock is swept back (default: 900)

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Database pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub url: SecretString,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    /// Applied server-side to every statement on every pooled connection
    pub statement_timeout: Duration,
}

impl DatabaseConfig {
    /// Defaults for everything but the URL.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: SecretString::from(url.into()),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_millis(5000),
        }
    }
}

/// Tunables of the booking services, independent of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Maximum number of pending rides returned by `list_available`
    pub available_rides_limit: i64,
    /// Held reservations older than this are released by the sweeper
    pub reservation_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            available_rides_limit: 10,
            reservation_ttl: Duration::from_secs(900),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub settings: EngineSettings,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`EngineConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = get_database_url(&lookup, "SOKO_DATABASE_URL")?;

        let database = DatabaseConfig {
            url,
            max_connections: get_parsed_or_default(&lookup, "SOKO_DB_MAX_CONNECTIONS", 10)?,
            min_connections: get_parsed_or_default(&lookup, "SOKO_DB_MIN_CONNECTIONS", 2)?,
            acquire_timeout: Duration::from_secs(get_parsed_or_default(
                &lookup,
                "SOKO_DB_ACQUIRE_TIMEOUT_SECS",
                10,
            )?),
            statement_timeout: Duration::from_millis(get_parsed_or_default(
                &lookup,
                "SOKO_DB_STATEMENT_TIMEOUT_MS",
                5000,
            )?),
        };

        if database.min_connections > database.max_connections {
            return Err(ConfigError::InvalidEnvVar(
                "SOKO_DB_MIN_CONNECTIONS".to_string(),
                format!(
                    "must not exceed SOKO_DB_MAX_CONNECTIONS ({})",
                    database.max_connections
                ),
            ));
        }

        let available_rides_limit: i64 =
            get_parsed_or_default(&lookup, "SOKO_AVAILABLE_RIDES_LIMIT", 10)?;
        if available_rides_limit <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SOKO_AVAILABLE_RIDES_LIMIT".to_string(),
                "must be positive".to_string(),
            ));
        }

        let settings = EngineSettings {
            available_rides_limit,
            reservation_ttl: Duration::from_secs(get_parsed_or_default(
                &lookup,
                "SOKO_RESERVATION_TTL_SECS",
                900,
            )?),
        };

        Ok(Self { database, settings })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(
    lookup: &impl Fn(&str) -> Option<String>,
    primary_key: &str,
) -> Result<SecretString, ConfigError> {
    lookup(primary_key)
        .or_else(|| lookup("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Parse an optional variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_url_set() {
        let config =
            EngineConfig::from_lookup(lookup(&[("SOKO_DATABASE_URL", "postgres://localhost/soko")]))
                .unwrap();
        assert_eq!(config.database.url.expose_secret(), "postgres://localhost/soko");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.min_connections, 2);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.database.statement_timeout, Duration::from_millis(5000));
        assert_eq!(config.settings, EngineSettings::default());
    }

    #[test]
    fn test_falls_back_to_database_url() {
        let config =
            EngineConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://fallback/db")]))
                .unwrap();
        assert_eq!(config.database.url.expose_secret(), "postgres://fallback/db");
    }

    #[test]
    fn test_missing_url() {
        let err = EngineConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "SOKO_DATABASE_URL"));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("SOKO_DATABASE_URL", "postgres://localhost/soko"),
            ("SOKO_DB_MAX_CONNECTIONS", "25"),
            ("SOKO_DB_STATEMENT_TIMEOUT_MS", "750"),
            ("SOKO_AVAILABLE_RIDES_LIMIT", " 20 "),
            ("SOKO_RESERVATION_TTL_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(config.database.max_connections, 25);
        assert_eq!(config.database.statement_timeout, Duration::from_millis(750));
        assert_eq!(config.settings.available_rides_limit, 20);
        assert_eq!(config.settings.reservation_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_number() {
        let err = EngineConfig::from_lookup(lookup(&[
            ("SOKO_DATABASE_URL", "postgres://localhost/soko"),
            ("SOKO_DB_MAX_CONNECTIONS", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "SOKO_DB_MAX_CONNECTIONS"));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[
            ("SOKO_DATABASE_URL", "postgres://localhost/soko"),
            ("SOKO_DB_MAX_CONNECTIONS", "2"),
            ("SOKO_DB_MIN_CONNECTIONS", "5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "SOKO_DB_MIN_CONNECTIONS"));
    }

    #[test]
    fn test_zero_rides_limit_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[
            ("SOKO_DATABASE_URL", "postgres://localhost/soko"),
            ("SOKO_AVAILABLE_RIDES_LIMIT", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }
}
