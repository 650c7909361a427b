//! Store configuration loaded from environment variables.
//!
//! | Variable | Default |
//! | --- | --- |
//! | `TASK_AUDIT_DATABASE_URL` (falls back to `DATABASE_URL`) | required |
//! | `TASK_AUDIT_DB_MAX_CONNECTIONS` | `10` |
//! | `TASK_AUDIT_DB_CONNECT_TIMEOUT_SECS` | `30` |

use crate::task::adapters::postgres::{PostgresTaskStore, TaskPgPool};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use std::time::Duration;
use thiserror::Error;

/// Primary database URL variable.
pub const DATABASE_URL_VAR: &str = "TASK_AUDIT_DATABASE_URL";
/// Fallback database URL variable.
pub const FALLBACK_DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Pool size variable.
pub const MAX_CONNECTIONS_VAR: &str = "TASK_AUDIT_DB_MAX_CONNECTIONS";
/// Connection timeout variable, in whole seconds.
pub const CONNECT_TIMEOUT_VAR: &str = "TASK_AUDIT_DB_CONNECT_TIMEOUT_SECS";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration or building the pool.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither database URL variable is set.
    #[error("missing environment variable {DATABASE_URL_VAR} (or {FALLBACK_DATABASE_URL_VAR})")]
    MissingDatabaseUrl,

    /// A variable is set to an unusable value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// The connection pool could not be created.
    #[error("failed to build connection pool: {0}")]
    Pool(#[from] PoolError),
}

/// Settings for the `PostgreSQL` store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Maximum pool size.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub connect_timeout: Duration,
}

impl StoreConfig {
    /// Creates a configuration with default pool settings.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingDatabaseUrl`] when no URL is configured and
    /// [`ConfigError::InvalidValue`] when a numeric setting does not parse or
    /// the pool size is zero.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = read(DATABASE_URL_VAR)
            .or_else(|| read(FALLBACK_DATABASE_URL_VAR))
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let max_connections = read(MAX_CONNECTIONS_VAR)
            .map_or(Ok(DEFAULT_MAX_CONNECTIONS), |raw| {
                parse_positive(MAX_CONNECTIONS_VAR, &raw)
            })?;

        let timeout_secs = read(CONNECT_TIMEOUT_VAR)
            .map_or(Ok(DEFAULT_CONNECT_TIMEOUT_SECS), |raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|err| ConfigError::InvalidValue {
                        key: CONNECT_TIMEOUT_VAR,
                        message: err.to_string(),
                    })
            })?;

        Ok(Self {
            database_url,
            max_connections,
            connect_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Builds an r2d2 connection pool for these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pool`] when the pool cannot open its initial
    /// connections.
    pub fn build_pool(&self) -> Result<TaskPgPool, ConfigError> {
        let manager = ConnectionManager::<PgConnection>::new(&self.database_url);
        Ok(Pool::builder()
            .max_size(self.max_connections)
            .connection_timeout(self.connect_timeout)
            .build(manager)?)
    }

    /// Builds the pool and wraps it in a [`PostgresTaskStore`].
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::build_pool`].
    pub fn connect(&self) -> Result<PostgresTaskStore, ConfigError> {
        self.build_pool().map(PostgresTaskStore::new)
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    let value = raw
        .trim()
        .parse::<u32>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            message: err.to_string(),
        })?;
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            message: "must be greater than zero".to_owned(),
        });
    }
    Ok(value)
}
