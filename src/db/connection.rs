//! Database connection management

use crate::error::{Result, WorkerError};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Type alias for the database pool
pub type DbPool = PgPool;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connection settings read from the process environment
#[derive(Clone)]
pub struct ConnectionSettings {
    pub database_url: String,
    pub password: String,
    pub max_connections: u32,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("database_url", &self.database_url)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl ConnectionSettings {
    /// Read DATABASE_URL, DATABASE_PASSWORD and DATABASE_MAX_CONNECTIONS
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    ///
    /// Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| WorkerError::ConfigError(format!("{} not set", key)))
        };

        let database_url = required("DATABASE_URL")?;
        let password = required("DATABASE_PASSWORD")?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
                WorkerError::ConfigError(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", raw))
            })?,
            _ => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            password,
            max_connections,
        })
    }
}

/// Create a new database connection pool
///
/// # Example
/// ```ignore
/// let settings = ConnectionSettings::from_env()?;
/// let pool = create_pool(&settings).await?;
/// ```
pub async fn create_pool(settings: &ConnectionSettings) -> Result<DbPool> {
    let options = PgConnectOptions::from_str(&settings.database_url)?.password(&settings.password);

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create a pool from the DATABASE_* environment variables
pub async fn create_pool_from_env() -> Result<DbPool> {
    let settings = ConnectionSettings::from_env()?;
    create_pool(&settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_settings_require_url_and_password() {
        let err = ConnectionSettings::from_lookup(lookup(&[("DATABASE_URL", "postgres://db")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: DATABASE_PASSWORD not set");

        let err = ConnectionSettings::from_lookup(lookup(&[
            ("DATABASE_URL", "  "),
            ("DATABASE_PASSWORD", "secret"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: DATABASE_URL not set");
    }

    #[test]
    fn test_settings_defaults_and_redaction() {
        let settings = ConnectionSettings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/grants"),
            ("DATABASE_PASSWORD", "secret"),
        ]))
        .unwrap();

        assert_eq!(settings.max_connections, 5);
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("postgres://db/grants"));
    }

    #[test]
    fn test_invalid_max_connections() {
        let result = ConnectionSettings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("DATABASE_PASSWORD", "secret"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ]));
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_create_pool() {
        dotenvy::dotenv().ok();
        let pool = create_pool_from_env().await;
        assert!(pool.is_ok());
    }
}
