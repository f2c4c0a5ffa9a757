//! PostgreSQL session store
//!
//! A [`SqlStore`] fixed to the Postgres dialect, configured with sqlx's
//! native [`PgConnectOptions`] or an existing [`PgPool`].

use super::{SqlPool, SqlStore};
use crate::config::{Connection, ErrorCallback, DEFAULT_MAX_CONNECTIONS, DEFAULT_TABLE};
use crate::error::{StorageError, StorageResult};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;

/// Parameters for a self-constructed Postgres pool
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Driver connect options
    pub connect: PgConnectOptions,
    /// Pool size upper bound
    pub max_connections: u32,
}

impl PostgresConfig {
    /// Open a pool with these connect options
    pub fn new(connect: PgConnectOptions) -> Self {
        Self {
            connect,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Parse a `postgres://` URL
    pub fn from_url(url: &str) -> StorageResult<Self> {
        let connect = PgConnectOptions::from_str(url)
            .map_err(|err| StorageError::Configuration(err.to_string()))?;
        Ok(Self::new(connect))
    }

    /// Set the pool size upper bound
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }
}

/// Options for [`postgres`]
#[derive(Clone)]
pub struct PostgresOptions {
    /// Pool parameters, or a caller-owned pool
    pub connection: Connection<PostgresConfig, PgPool>,
    /// Session table name
    pub table: String,
    /// Called once if connecting or creating the table fails
    pub on_init_error: Option<ErrorCallback>,
}

impl PostgresOptions {
    /// Let the store open its own pool
    pub fn new(config: PostgresConfig) -> Self {
        Self {
            connection: Connection::New(config),
            table: DEFAULT_TABLE.to_string(),
            on_init_error: None,
        }
    }

    /// Reuse a caller-owned pool
    pub fn existing(pool: PgPool) -> Self {
        Self {
            connection: Connection::Existing(pool),
            table: DEFAULT_TABLE.to_string(),
            on_init_error: None,
        }
    }

    /// Override the session table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Register a callback for connection and setup failures
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StorageError) + Send + Sync + 'static,
    {
        self.on_init_error = Some(Arc::new(handler));
        self
    }
}

/// Build a Postgres-backed session store
pub fn postgres(options: PostgresOptions) -> SqlStore {
    let PostgresOptions {
        connection,
        table,
        on_init_error,
    } = options;
    let connect = async move {
        let pool = match connection {
            Connection::New(config) => {
                PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect_with(config.connect)
                    .await?
            }
            Connection::Existing(pool) => pool,
        };
        Ok::<_, StorageError>(SqlPool::Postgres(pool))
    };
    SqlStore::with_connector(connect, table, true, on_init_error)
}
