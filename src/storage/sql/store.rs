//! Dialect-agnostic SQL session store

use super::Dialect;
use crate::codec;
use crate::config::{Connection, ErrorCallback, DEFAULT_MAX_CONNECTIONS, DEFAULT_TABLE};
use crate::error::{StorageError, StorageResult};
use crate::init::InitGate;
use crate::storage::{SessionStore, SessionValue};
use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, trace};

#[cfg(feature = "mysql")]
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
#[cfg(feature = "postgres")]
use sqlx::postgres::{PgPool, PgPoolOptions};
#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// A connection pool for one of the compiled-in SQL dialects
#[derive(Debug, Clone)]
pub enum SqlPool {
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    #[cfg(feature = "mysql")]
    MySql(MySqlPool),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

/// Run `$body` with `$conn` bound to the concrete pool inside a [`SqlPool`]
macro_rules! with_pool {
    ($pool:expr, $conn:ident => $body:expr) => {
        match $pool {
            #[cfg(feature = "postgres")]
            SqlPool::Postgres($conn) => $body,
            #[cfg(feature = "mysql")]
            SqlPool::MySql($conn) => $body,
            #[cfg(feature = "sqlite")]
            SqlPool::Sqlite($conn) => $body,
        }
    };
}

impl SqlPool {
    /// Dialect spoken by this pool
    pub fn dialect(&self) -> Dialect {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => Dialect::Postgres,
            #[cfg(feature = "mysql")]
            Self::MySql(_) => Dialect::MySql,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Open a pool for the dialect named by the config URL
    pub async fn connect(config: &SqlConfig) -> StorageResult<Self> {
        let dialect = Dialect::from_url(&config.url)?;
        debug!(%dialect, max_connections = config.max_connections, "Connecting SQL pool");
        match dialect {
            #[cfg(feature = "postgres")]
            Dialect::Postgres => Ok(Self::Postgres(
                PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await?,
            )),
            #[cfg(feature = "mysql")]
            Dialect::MySql => Ok(Self::MySql(
                MySqlPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await?,
            )),
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => Ok(Self::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await?,
            )),
            #[allow(unreachable_patterns)]
            other => Err(StorageError::Configuration(format!(
                "{} support is not enabled in this build",
                other
            ))),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<PgPool> for SqlPool {
    fn from(pool: PgPool) -> Self {
        Self::Postgres(pool)
    }
}

#[cfg(feature = "mysql")]
impl From<MySqlPool> for SqlPool {
    fn from(pool: MySqlPool) -> Self {
        Self::MySql(pool)
    }
}

#[cfg(feature = "sqlite")]
impl From<SqlitePool> for SqlPool {
    fn from(pool: SqlitePool) -> Self {
        Self::Sqlite(pool)
    }
}

/// Parameters for a self-constructed SQL pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlConfig {
    /// `postgres://`, `mysql://` or `sqlite:` connection URL
    pub url: String,
    /// Pool size upper bound
    pub max_connections: u32,
}

impl SqlConfig {
    /// Connect to `url`, picking the dialect from its scheme
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Set the pool size upper bound
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }
}

/// Options for [`SqlStore::new`]
#[derive(Clone)]
pub struct SqlOptions {
    /// Pool parameters, or a caller-owned pool
    pub connection: Connection<SqlConfig, SqlPool>,
    /// Session table name
    pub table: String,
    /// Issue `CREATE TABLE IF NOT EXISTS` during setup
    pub create_table: bool,
    /// Called once if connecting or creating the table fails
    pub on_init_error: Option<ErrorCallback>,
}

impl SqlOptions {
    /// Let the store open its own pool
    pub fn new(config: SqlConfig) -> Self {
        Self::from_connection(Connection::New(config))
    }

    /// Reuse a caller-owned pool
    pub fn existing(pool: impl Into<SqlPool>) -> Self {
        Self::from_connection(Connection::Existing(pool.into()))
    }

    fn from_connection(connection: Connection<SqlConfig, SqlPool>) -> Self {
        Self {
            connection,
            table: DEFAULT_TABLE.to_string(),
            create_table: true,
            on_init_error: None,
        }
    }

    /// Override the session table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Whether to create the session table during setup
    ///
    /// Disable when attaching to a table managed elsewhere.
    pub fn create_table(mut self, create: bool) -> Self {
        self.create_table = create;
        self
    }

    /// Register a callback for connection and setup failures
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StorageError) + Send + Sync + 'static,
    {
        self.on_init_error = Some(std::sync::Arc::new(handler));
        self
    }
}

/// Session store over any supported relational database
///
/// Rows are `(key, session)` with `key` as primary key and the session as
/// JSON text. Writes are upserts using the dialect's own conflict clause.
///
/// ```no_run
/// use talk_sessions::sql::{SqlConfig, SqlOptions, SqlStore};
/// use talk_sessions::SessionStore;
///
/// # async fn run() -> talk_sessions::StorageResult<()> {
/// let store = SqlStore::new(SqlOptions::new(SqlConfig::new("sqlite://sessions.db")));
/// store.set("chat:42", serde_json::json!({ "step": 1 })).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SqlStore {
    table: String,
    gate: InitGate<SqlPool>,
}

impl SqlStore {
    /// Create the store; connecting and table setup start in the background
    pub fn new(options: SqlOptions) -> Self {
        let SqlOptions {
            connection,
            table,
            create_table,
            on_init_error,
        } = options;
        let connect = async move {
            match connection {
                Connection::New(config) => SqlPool::connect(&config).await,
                Connection::Existing(pool) => Ok(pool),
            }
        };
        Self::with_connector(connect, table, create_table, on_init_error)
    }

    /// Shared constructor for the dialect-specific factories
    pub(crate) fn with_connector<F>(
        connect: F,
        table: String,
        create_table: bool,
        on_init_error: Option<ErrorCallback>,
    ) -> Self
    where
        F: Future<Output = StorageResult<SqlPool>> + Send + 'static,
    {
        let setup_table = table.clone();
        let setup = async move {
            let pool = connect.await?;
            if create_table {
                bootstrap(&pool, &setup_table).await?;
            }
            Ok::<_, StorageError>(pool)
        };
        Self {
            table,
            gate: InitGate::start("sql", setup, on_init_error),
        }
    }

    /// Session table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The pool, once setup has finished
    pub async fn pool(&self) -> StorageResult<SqlPool> {
        self.gate.wait().await
    }
}

async fn bootstrap(pool: &SqlPool, table: &str) -> StorageResult<()> {
    let sql = pool.dialect().create_table(table);
    debug!(dialect = %pool.dialect(), table, "Ensuring session table exists");
    with_pool!(pool, conn => sqlx::query(&sql).execute(conn).await.map(|_| ()))
        .map_err(|err| StorageError::Setup(format!("creating table {}: {}", table, err)))?;
    Ok(())
}

#[async_trait]
impl<T: SessionValue> SessionStore<T> for SqlStore {
    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        let pool = self.gate.wait().await?;
        let sql = pool.dialect().select(&self.table);
        trace!(key, table = %self.table, "Loading session");
        let raw = with_pool!(&pool, conn => {
            sqlx::query_scalar::<_, Option<String>>(&sql)
                .bind(key)
                .fetch_optional(conn)
                .await?
        });
        codec::decode_stored(raw.flatten())
    }

    async fn set(&self, key: &str, session: T) -> StorageResult<()> {
        let encoded = codec::encode(&session)?;
        let pool = self.gate.wait().await?;
        let sql = pool.dialect().upsert(&self.table);
        trace!(key, table = %self.table, "Saving session");
        with_pool!(&pool, conn => {
            sqlx::query(&sql)
                .bind(key)
                .bind(encoded.as_str())
                .execute(conn)
                .await?;
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let pool = self.gate.wait().await?;
        let sql = pool.dialect().delete(&self.table);
        trace!(key, table = %self.table, "Deleting session");
        with_pool!(&pool, conn => {
            sqlx::query(&sql).bind(key).execute(conn).await?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_config_defaults() {
        let config = SqlConfig::new("postgres://localhost/bot");
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.with_max_connections(0).max_connections, 1);
    }

    #[test]
    fn test_sql_options_builder() {
        let options = SqlOptions::new(SqlConfig::new("sqlite::memory:"))
            .with_table("bot_sessions")
            .create_table(false)
            .with_error_handler(|_| {});
        assert_eq!(options.table, "bot_sessions");
        assert!(!options.create_table);
        assert!(options.on_init_error.is_some());
        assert!(options.connection.is_owned());
    }

    #[tokio::test]
    async fn test_unknown_scheme_fails_setup() {
        let store = SqlStore::new(SqlOptions::new(SqlConfig::new("oracle://db")));
        let result: StorageResult<Option<String>> = store.get("k").await;
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }
}
