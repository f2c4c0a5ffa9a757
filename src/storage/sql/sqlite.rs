//! SQLite session store
//!
//! A [`SqlStore`] fixed to the SQLite dialect, opened from a database file or
//! an existing [`SqlitePool`].

use super::{SqlPool, SqlStore};
use crate::config::{Connection, ErrorCallback, DEFAULT_TABLE};
use crate::error::StorageError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::sync::Arc;

/// Parameters for opening a SQLite database file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file path
    pub filename: PathBuf,
    /// Create the file if it doesn't exist
    pub create_if_missing: bool,
    /// Pool size upper bound
    pub max_connections: u32,
}

impl SqliteConfig {
    /// Open `filename`, creating it if needed
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            create_if_missing: true,
            max_connections: 1,
        }
    }

    /// Whether to create the file when it doesn't exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set the pool size upper bound
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.filename)
            .create_if_missing(self.create_if_missing)
    }
}

/// Options for [`sqlite`]
#[derive(Clone)]
pub struct SqliteOptions {
    /// Database file, or a caller-owned pool
    pub connection: Connection<SqliteConfig, SqlitePool>,
    /// Session table name
    pub table: String,
    /// Called once if opening the file or creating the table fails
    pub on_init_error: Option<ErrorCallback>,
}

impl SqliteOptions {
    /// Let the store open its own pool
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            connection: Connection::New(config),
            table: DEFAULT_TABLE.to_string(),
            on_init_error: None,
        }
    }

    /// Reuse a caller-owned pool
    pub fn existing(pool: SqlitePool) -> Self {
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

/// Build a SQLite-backed session store
pub fn sqlite(options: SqliteOptions) -> SqlStore {
    let SqliteOptions {
        connection,
        table,
        on_init_error,
    } = options;
    let connect = async move {
        let pool = match connection {
            Connection::New(config) => {
                SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect_with(config.connect_options())
                    .await?
            }
            Connection::Existing(pool) => pool,
        };
        Ok::<_, StorageError>(SqlPool::Sqlite(pool))
    };
    SqlStore::with_connector(connect, table, true, on_init_error)
}
