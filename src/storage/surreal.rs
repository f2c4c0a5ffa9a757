//! SurrealDB session store
//!
//! Sessions live in the `telegraf_sessions` table (configurable), one record
//! per key, with the session held natively in the `value` field. The record id is derived
//! from the key with [`keys::record_id`], which is collision free.

use crate::config::{Connection, ErrorCallback, DEFAULT_TABLE};
use crate::error::{StorageError, StorageResult};
use crate::init::InitGate;
use crate::keys;
use crate::storage::{SessionStore, SessionValue};
use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, trace};

/// Parameters for a self-constructed SurrealDB client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurrealConfig {
    /// `ws://`, `wss://`, `http://` or `https://` endpoint
    pub url: String,
    /// Namespace selected after sign-in
    pub namespace: String,
    /// Database selected after sign-in
    pub database: String,
    /// Root user name
    pub username: String,
    /// Root password
    pub password: String,
}

impl SurrealConfig {
    /// Connect to `url` and sign in as root before selecting the namespace
    pub fn new(
        url: impl Into<String>,
        namespace: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            namespace: namespace.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Options for [`SurrealStore::new`]
#[derive(Clone)]
pub struct SurrealOptions {
    /// Client parameters, or a caller-owned client
    pub connection: Connection<SurrealConfig, Surreal<Any>>,
    /// Table name; `-` is mapped to `_` to fit the identifier grammar
    pub table: String,
    /// Called once if connecting or defining the table fails
    pub on_init_error: Option<ErrorCallback>,
}

impl SurrealOptions {
    /// Let the store build its own client
    pub fn new(config: SurrealConfig) -> Self {
        Self {
            connection: Connection::New(config),
            table: DEFAULT_TABLE.to_string(),
            on_init_error: None,
        }
    }

    /// Reuse a caller-owned client that is already signed in and scoped
    pub fn existing(client: Surreal<Any>) -> Self {
        Self {
            connection: Connection::Existing(client),
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

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord<T> {
    value: T,
}

/// SurrealDB-backed session store
#[derive(Clone)]
pub struct SurrealStore {
    table: String,
    gate: InitGate<Surreal<Any>>,
}

impl SurrealStore {
    /// Create the store; connecting and sign-in start in the background
    pub fn new(options: SurrealOptions) -> Self {
        let SurrealOptions {
            connection,
            table,
            on_init_error,
        } = options;
        let table = keys::table_ident(&table);
        let setup_table = table.clone();
        let setup = async move {
            let client = match connection {
                Connection::New(config) => connect(config).await?,
                Connection::Existing(client) => client,
            };
            debug!(table = %setup_table, "Defining session table");
            client
                .query(format!("DEFINE TABLE IF NOT EXISTS {} SCHEMALESS", setup_table))
                .await
                .and_then(|response| response.check())
                .map_err(|err| StorageError::Setup(err.to_string()))?;
            Ok::<_, StorageError>(client)
        };
        Self {
            table,
            gate: InitGate::start("surrealdb", setup, on_init_error),
        }
    }

    /// Table holding the session records
    pub fn table(&self) -> &str {
        &self.table
    }

    fn resource(&self, key: &str) -> (String, String) {
        (self.table.clone(), keys::record_id(key))
    }
}

async fn connect(config: SurrealConfig) -> StorageResult<Surreal<Any>> {
    let client = any::connect(config.url.as_str())
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
    client
        .signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
    client
        .use_ns(config.namespace.as_str())
        .use_db(config.database.as_str())
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
    Ok(client)
}

#[async_trait]
impl<T: SessionValue> SessionStore<T> for SurrealStore {
    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        let client = self.gate.wait().await?;
        trace!(key, table = %self.table, "select session");
        let record: Option<SessionRecord<T>> = client.select(self.resource(key)).await?;
        Ok(record.map(|record| record.value))
    }

    async fn set(&self, key: &str, session: T) -> StorageResult<()> {
        let client = self.gate.wait().await?;
        trace!(key, table = %self.table, "upsert session");
        let _: Option<SessionRecord<T>> = client
            .upsert(self.resource(key))
            .content(SessionRecord { value: session })
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let client = self.gate.wait().await?;
        trace!(key, table = %self.table, "delete session");
        // the removed record may predate the current session type
        let _: Option<IgnoredAny> = client.delete(self.resource(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
    }

    async fn memory_store(options: impl FnOnce(Surreal<Any>) -> SurrealOptions) -> SurrealStore {
        let client = any::connect("mem://").await.unwrap();
        client.use_ns("bot").use_db("sessions").await.unwrap();
        SurrealStore::new(options(client))
    }

    #[tokio::test]
    async fn test_record_ids_are_distinct() {
        let store = SurrealStore::new(SurrealOptions::new(SurrealConfig::new(
            "ws://127.0.0.1:1",
            "bot",
            "sessions",
            "root",
            "root",
        )));
        assert_eq!(store.table(), "telegraf_sessions");

        let (table, colon) = store.resource("1:2");
        let (_, underscore) = store.resource("1_2");
        assert_eq!(table, "telegraf_sessions");
        assert_ne!(colon, underscore);
        assert_eq!(keys::session_key(&colon).as_deref(), Some("1:2"));
    }

    #[tokio::test]
    async fn test_table_override_is_mapped_to_identifier() {
        let store = memory_store(|client| SurrealOptions::existing(client).with_table("bot-state")).await;
        assert_eq!(store.table(), "bot_state");

        store.set("u1", Counter { count: 3 }).await.unwrap();
        assert_eq!(store.get("u1").await.unwrap(), Some(Counter { count: 3 }));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = memory_store(SurrealOptions::existing).await;
        store.set("1:2", json!({ "count": 1 })).await.unwrap();
        store.set("1_2", json!({ "count": 2 })).await.unwrap();
        assert_eq!(store.get("1:2").await.unwrap(), Some(json!({ "count": 1 })));
        assert_eq!(store.get("1_2").await.unwrap(), Some(json!({ "count": 2 })));

        SessionStore::<Value>::delete(&store, "1:2").await.unwrap();
        let gone: Option<Value> = store.get("1:2").await.unwrap();
        assert!(gone.is_none());
        assert_eq!(store.get("1_2").await.unwrap(), Some(json!({ "count": 2 })));

        SessionStore::<Value>::delete(&store, "never-set").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_ignores_stored_shape() {
        let store = memory_store(SurrealOptions::existing).await;
        store.set("u1", Counter { count: 1 }).await.unwrap();

        let result = SessionStore::<Profile>::delete(&store, "u1").await;
        assert!(result.is_ok(), "delete should not decode the removed session");

        let gone: Option<Counter> = store.get("u1").await.unwrap();
        assert!(gone.is_none());
    }
}
