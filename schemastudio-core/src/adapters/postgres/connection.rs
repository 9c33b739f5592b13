//! PostgreSQL connection pool management.
//!
//! # Security Features
//! - Connection strings are validated and only ever logged redacted
//! - Pool limits and session timeouts come from `ConnectionConfig`
//! - Session settings are applied to every pooled connection

use super::PostgresStudio;
use crate::config::{ConnectionConfig, QueryConfig};
use crate::error::{StudioError, redact_database_url};
use crate::Result;
use sqlx::PgPool;
use zeroize::Zeroizing;

impl PostgresStudio {
    /// Creates a studio over a new lazily-connected pool.
    ///
    /// Pool sizing and session timeouts are read from the URL's query
    /// parameters (see [`ConnectionConfig::from_url`]).
    ///
    /// # Errors
    /// Returns a configuration error if the connection string or one of its
    /// recognised parameters is invalid. No network I/O happens here; use
    /// [`PostgresStudio::test_connection`] to verify reachability.
    pub fn new(connection_string: &str) -> Result<Self> {
        let config = ConnectionConfig::from_url(connection_string)?;
        Self::with_config(connection_string, config)
    }

    /// Creates a studio with an explicit pool configuration.
    ///
    /// # Errors
    /// Returns a configuration error if `config` or the connection string
    /// is invalid.
    pub fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        ConnectionConfig::validate_connection_string(connection_string)?;

        let pool = create_connection_pool(connection_string, &config)?;
        let mut studio = Self::from_pool(pool, config);
        studio.connection_string = Some(Zeroizing::new(connection_string.to_string()));
        Ok(studio)
    }

    /// Builds the studio around an existing pool.
    ///
    /// The pool is the only capability the components share; a studio built
    /// this way has no bound connection string.
    pub fn from_pool(pool: PgPool, config: ConnectionConfig) -> Self {
        Self::assemble(pool, config, QueryConfig::default())
    }

    /// Checks that a connection can be acquired and answers a trivial query.
    ///
    /// # Errors
    /// Returns [`StudioError::Connection`] on any failure.
    pub async fn ping(&self) -> Result<()> {
        let result: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                StudioError::connection_failed(format!("Failed to reach {}", self.config), e)
            })?;

        if result != 1 {
            return Err(StudioError::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }

        tracing::debug!("Connectivity check succeeded for {}", self.config);
        Ok(())
    }

    /// Closes the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Creates a lazily-connecting pool with session settings applied to
/// every new connection.
///
/// # Session settings
/// - `statement_timeout` and `lock_timeout` from the config
/// - `application_name = schemastudio-<version>`
/// - `timezone = UTC`
pub(crate) fn create_connection_pool(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<PgPool> {
    use sqlx::Executor;

    let statement_timeout_ms = config.statement_timeout.as_millis();
    let lock_timeout_ms = config.lock_timeout.as_millis();

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_idle_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout = '{}ms'", statement_timeout_ms).as_str())
                    .await?;
                conn.execute(format!("SET lock_timeout = '{}ms'", lock_timeout_ms).as_str())
                    .await?;

                let app_name = format!("schemastudio-{}", env!("CARGO_PKG_VERSION"));
                conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                    .await?;

                conn.execute("SET timezone = 'UTC'").await?;
                Ok(())
            })
        })
        .connect_lazy(connection_string)
        .map_err(|e| {
            StudioError::connection_failed(
                format!(
                    "Failed to create PostgreSQL connection pool to {}",
                    redact_database_url(connection_string)
                ),
                e,
            )
        })
}
