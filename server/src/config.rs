//! Configuration management for the server.

use std::env;
use std::time::Duration;

/// Deployment environment. Controls how much error detail leaves the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Which durable store backs the purchase records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL at the given connection URL
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    /// Process-local store, lost on restart
    Memory,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Purchase store backend
    pub store: StoreBackend,
    /// Deployment environment
    pub environment: Environment,
    /// Upper bound for a single store write
    pub store_timeout: Duration,
    /// Items of one batch persisted at the same time
    pub sync_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            store: StoreBackend::Memory,
            environment: Environment::Development,
            store_timeout: Duration::from_millis(5000),
            sync_concurrency: 4,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let store = match lookup("STORE_BACKEND").as_deref().unwrap_or("postgres") {
            "postgres" => {
                let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?;
                let max_connections = parse_number(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
                StoreBackend::Postgres {
                    database_url,
                    max_connections,
                }
            }
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::InvalidStoreBackend(other.to_string())),
        };

        let environment = match lookup("APP_ENV").as_deref() {
            None | Some("development") => Environment::Development,
            Some("production") => Environment::Production,
            Some(other) => return Err(ConfigError::InvalidEnvironment(other.to_string())),
        };

        let store_timeout =
            Duration::from_millis(parse_number(&lookup, "STORE_TIMEOUT_MS", 5000)?);

        let sync_concurrency: usize = parse_number(&lookup, "SYNC_CONCURRENCY", 4)?;
        if sync_concurrency == 0 {
            return Err(ConfigError::InvalidNumber("SYNC_CONCURRENCY"));
        }

        Ok(Self {
            host,
            port,
            store,
            environment,
            store_timeout,
            sync_concurrency,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {0} value")]
    InvalidNumber(&'static str),

    #[error("Unknown STORE_BACKEND '{0}' (expected postgres or memory)")]
    InvalidStoreBackend(String),

    #[error("Unknown APP_ENV '{0}' (expected production or development)")]
    InvalidEnvironment(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_database_url() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/cartsync")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.sync_concurrency, 4);
        assert_eq!(
            config.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/cartsync".into(),
                max_connections: 10,
            }
        );
    }

    #[test]
    fn postgres_requires_database_url() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingDatabaseUrl)));
    }

    #[test]
    fn memory_backend_needs_no_url() {
        let config = load(&[("STORE_BACKEND", "memory"), ("APP_ENV", "production")]).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert!(config.environment.is_production());
    }

    #[test]
    fn rejects_bad_values() {
        let base = ("STORE_BACKEND", "memory");
        assert!(matches!(
            load(&[base, ("PORT", "http")]),
            Err(ConfigError::InvalidPort)
        ));
        assert!(matches!(
            load(&[base, ("STORE_TIMEOUT_MS", "-1")]),
            Err(ConfigError::InvalidNumber("STORE_TIMEOUT_MS"))
        ));
        assert!(matches!(
            load(&[base, ("SYNC_CONCURRENCY", "0")]),
            Err(ConfigError::InvalidNumber("SYNC_CONCURRENCY"))
        ));
        assert!(matches!(
            load(&[("STORE_BACKEND", "mongo")]),
            Err(ConfigError::InvalidStoreBackend(_))
        ));
        assert!(matches!(
            load(&[base, ("APP_ENV", "staging")]),
            Err(ConfigError::InvalidEnvironment(_))
        ));
    }
}
