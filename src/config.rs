//! Store configuration shared by every adapter
//!
//! Holds the process-wide defaults, the "new vs existing client" union and the
//! serde-friendly [`BackendConfig`] a host can load from its own config file.

use crate::error::StorageError;
use crate::storage::memory::MemoryStore;
use crate::storage::{SessionValue, SharedSessionStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default table / collection name
pub const DEFAULT_TABLE: &str = "telegraf-sessions";

/// Default key prefix for cache backends
pub const DEFAULT_PREFIX: &str = "telegraf:";

/// Default Redis URL used when none is configured
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Database used by MongoDB when the connection URL does not name one
pub const DEFAULT_MONGO_DATABASE: &str = "test";

/// Default upper bound for self-constructed SQL pools
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Callback invoked once when connecting or bootstrapping a store fails
pub type ErrorCallback = Arc<dyn Fn(&StorageError) + Send + Sync>;

/// Where an adapter gets its backend client from
///
/// `New` hands the adapter connection parameters; the adapter builds the
/// client and owns it for the lifetime of the store. `Existing` adopts a
/// caller-constructed client, which the caller remains responsible for closing.
#[derive(Clone)]
pub enum Connection<C, H> {
    /// Build a new client from these parameters
    New(C),
    /// Reuse an already constructed client / pool
    Existing(H),
}

impl<C, H> Connection<C, H> {
    /// Whether the adapter owns the client
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

impl<C: fmt::Debug, H> fmt::Debug for Connection<C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New(config) => f.debug_tuple("New").field(config).finish(),
            Self::Existing(_) => f.write_str("Existing(..)"),
        }
    }
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

#[cfg(feature = "redis")]
fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
fn default_create_table() -> bool {
    true
}

#[cfg(feature = "ydb")]
fn default_connection_timeout_secs() -> u64 {
    10
}

/// Declarative choice of backend, suitable for loading from JSON or TOML
///
/// ```
/// use talk_sessions::BackendConfig;
///
/// let config: BackendConfig = serde_json::from_str(r#"{ "backend": "memory" }"#).unwrap();
/// assert_eq!(config.backend_name(), "memory");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
#[non_exhaustive]
pub enum BackendConfig {
    /// Process-local map
    Memory,

    /// Relational database, dialect picked from the URL scheme
    #[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
    Sql {
        /// Connection URL
        url: String,
        /// Session table name
        #[serde(default = "default_table")]
        table: String,
        /// Pool size upper bound
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Create the session table during setup
        #[serde(default = "default_create_table")]
        create_table: bool,
    },

    /// Redis key-value cache
    #[cfg(feature = "redis")]
    Redis {
        /// Connection URL
        url: String,
        /// Prepended to every session key
        #[serde(default = "default_prefix")]
        prefix: String,
    },

    /// MongoDB document store
    #[cfg(feature = "mongodb")]
    Mongodb {
        /// Connection URL
        url: String,
        /// Database name; falls back to the URL's, then `"test"`
        #[serde(default)]
        database: Option<String>,
        /// Collection holding the session documents
        #[serde(default = "default_table")]
        collection: String,
    },

    /// YDB distributed table store
    #[cfg(feature = "ydb")]
    Ydb {
        /// `grpc://` or `grpcs://` endpoint
        endpoint: String,
        /// Database name or path
        database: String,
        /// Static credentials user
        #[serde(default)]
        user: Option<String>,
        /// Static credentials password
        #[serde(default)]
        password: Option<String>,
        /// Session table name
        #[serde(default = "default_table")]
        table: String,
        /// Upper bound for endpoint discovery, in seconds
        #[serde(default = "default_connection_timeout_secs")]
        connection_timeout_secs: u64,
    },

    /// SurrealDB graph/document store
    #[cfg(feature = "surrealdb")]
    Surrealdb {
        /// Connection URL
        url: String,
        /// Namespace selected after sign-in
        namespace: String,
        /// Database name or path
        database: String,
        /// Root user name
        username: String,
        /// Root password
        password: String,
        /// Session table name
        #[serde(default = "default_table")]
        table: String,
    },
}

impl BackendConfig {
    /// Short name of the configured backend, as used in the `backend` tag
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            #[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
            Self::Sql { .. } => "sql",
            #[cfg(feature = "redis")]
            Self::Redis { .. } => "redis",
            #[cfg(feature = "mongodb")]
            Self::Mongodb { .. } => "mongodb",
            #[cfg(feature = "ydb")]
            Self::Ydb { .. } => "ydb",
            #[cfg(feature = "surrealdb")]
            Self::Surrealdb { .. } => "surrealdb",
        }
    }

    /// Construct the configured store
    ///
    /// Returns immediately; connection and table setup continue in the
    /// background and failures are reported through `on_init_error`.
    pub fn open<T>(self, on_init_error: Option<ErrorCallback>) -> SharedSessionStore<T>
    where
        T: SessionValue + Clone,
    {
        tracing::info!(backend = self.backend_name(), "Opening session store");
        match self {
            Self::Memory => {
                let _ = on_init_error;
                Arc::new(MemoryStore::<T>::new())
            }
            #[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
            Self::Sql {
                url,
                table,
                max_connections,
                create_table,
            } => {
                use crate::storage::sql::{SqlConfig, SqlOptions, SqlStore};
                let mut options =
                    SqlOptions::new(SqlConfig::new(url).with_max_connections(max_connections))
                        .with_table(table)
                        .create_table(create_table);
                options.on_init_error = on_init_error;
                Arc::new(SqlStore::new(options))
            }
            #[cfg(feature = "redis")]
            Self::Redis { url, prefix } => {
                use crate::storage::redis::{RedisConfig, RedisOptions, RedisStore};
                let mut options = RedisOptions::new(RedisConfig::new(url)).with_prefix(prefix);
                options.on_init_error = on_init_error;
                Arc::new(RedisStore::new(options))
            }
            #[cfg(feature = "mongodb")]
            Self::Mongodb {
                url,
                database,
                collection,
            } => {
                use crate::storage::mongo::{MongoConfig, MongoOptions, MongoStore};
                let mut config = MongoConfig::new(url);
                config.database = database;
                let mut options = MongoOptions::new(config).with_collection(collection);
                options.on_init_error = on_init_error;
                Arc::new(MongoStore::new(options))
            }
            #[cfg(feature = "ydb")]
            Self::Ydb {
                endpoint,
                database,
                user,
                password,
                table,
                connection_timeout_secs,
            } => {
                use crate::storage::ydb::{YdbConfig, YdbOptions, YdbStore};
                let mut config = YdbConfig::new(endpoint, database).with_connection_timeout(
                    std::time::Duration::from_secs(connection_timeout_secs),
                );
                if let (Some(user), Some(password)) = (user, password) {
                    config = config.with_static_credentials(user, password);
                }
                let mut options = YdbOptions::new(config).with_table(table);
                options.on_init_error = on_init_error;
                Arc::new(YdbStore::new(options))
            }
            #[cfg(feature = "surrealdb")]
            Self::Surrealdb {
                url,
                namespace,
                database,
                username,
                password,
                table,
            } => {
                use crate::storage::surreal::{SurrealConfig, SurrealOptions, SurrealStore};
                let config = SurrealConfig::new(url, namespace, database, username, password);
                let mut options = SurrealOptions::new(config).with_table(table);
                options.on_init_error = on_init_error;
                Arc::new(SurrealStore::new(options))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_backend_from_json() {
        let config: BackendConfig = serde_json::from_value(json!({ "backend": "memory" })).unwrap();
        assert_eq!(config, BackendConfig::Memory);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = serde_json::from_value::<BackendConfig>(json!({ "backend": "etcd" }));
        assert!(result.is_err());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sql_backend_defaults() {
        let config: BackendConfig =
            serde_json::from_value(json!({ "backend": "sql", "url": "sqlite::memory:" })).unwrap();
        match config {
            BackendConfig::Sql {
                url,
                table,
                max_connections,
                create_table,
            } => {
                assert_eq!(url, "sqlite::memory:");
                assert_eq!(table, DEFAULT_TABLE);
                assert_eq!(max_connections, DEFAULT_MAX_CONNECTIONS);
                assert!(create_table);
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[cfg(feature = "surrealdb")]
    #[test]
    fn test_surrealdb_backend_table_default() {
        let config: BackendConfig = serde_json::from_value(json!({
            "backend": "surrealdb",
            "url": "ws://localhost:8000",
            "namespace": "bot",
            "database": "sessions",
            "username": "root",
            "password": "root"
        }))
        .unwrap();
        match config {
            BackendConfig::Surrealdb { table, .. } => assert_eq!(table, DEFAULT_TABLE),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_connection_ownership() {
        let owned: Connection<&str, ()> = Connection::New("redis://localhost");
        let borrowed: Connection<&str, ()> = Connection::Existing(());
        assert!(owned.is_owned());
        assert!(!borrowed.is_owned());
        assert_eq!(format!("{:?}", borrowed), "Existing(..)");
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = BackendConfig::Memory.open::<serde_json::Value>(None);
        store.set("k", json!({ "count": 1 })).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({ "count": 1 })));
    }
}
