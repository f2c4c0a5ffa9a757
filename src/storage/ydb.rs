//! YDB session store
//!
//! Sessions are rows `(key Utf8, session Utf8)` keyed by `key`. Every
//! statement declares its parameters and binds them; keys and values are
//! never spliced into YQL text.

use crate::codec;
use crate::config::{Connection, ErrorCallback, DEFAULT_TABLE};
use crate::error::{StorageError, StorageResult};
use crate::init::InitGate;
use crate::storage::{SessionStore, SessionValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use ydb::{Client, ClientBuilder, Query, Value};

const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// User/password pair for YDB static credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    /// User name
    pub user: String,
    /// Password
    pub password: String,
}

/// Parameters for a self-constructed YDB client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YdbConfig {
    /// `grpc://host:2136` or `grpcs://host:2135`
    pub endpoint: String,
    /// Database path, e.g. `/local`
    pub database: String,
    /// Static credentials; anonymous when `None`
    pub credentials: Option<StaticCredentials>,
    /// Upper bound for endpoint discovery on connect
    pub connection_timeout: Duration,
}

impl YdbConfig {
    /// Connect to `database` through `endpoint` with no credentials
    pub fn new(endpoint: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            credentials: None,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    /// Authenticate with a user/password pair
    pub fn with_static_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(StaticCredentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Bound the time spent waiting for endpoint discovery
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Connection string understood by the YDB client builder
    pub fn connection_string(&self) -> String {
        format!("{}?database={}", self.endpoint, self.database)
    }
}

/// Options for [`YdbStore::new`]
#[derive(Clone)]
pub struct YdbOptions {
    /// Client parameters, or a caller-owned client
    pub connection: Connection<YdbConfig, Arc<Client>>,
    /// Session table name
    pub table: String,
    /// Called once if discovery or creating the table fails
    pub on_init_error: Option<ErrorCallback>,
}

impl YdbOptions {
    /// Let the store build its own client
    pub fn new(config: YdbConfig) -> Self {
        Self {
            connection: Connection::New(config),
            table: DEFAULT_TABLE.to_string(),
            on_init_error: None,
        }
    }

    /// Reuse a caller-owned client that has already finished discovery
    pub fn existing(client: Arc<Client>) -> Self {
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

fn quote_table(table: &str) -> String {
    format!("`{}`", table.replace('`', "``"))
}

fn create_table_yql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (key Utf8, session Utf8, PRIMARY KEY (key))",
        quote_table(table)
    )
}

fn select_yql(table: &str) -> String {
    format!(
        "DECLARE $key AS Utf8;\nSELECT session FROM {} WHERE key = $key LIMIT 1;",
        quote_table(table)
    )
}

fn upsert_yql(table: &str) -> String {
    format!(
        "DECLARE $key AS Utf8;\nDECLARE $session AS Utf8;\nUPSERT INTO {} (key, session) VALUES ($key, $session);",
        quote_table(table)
    )
}

fn delete_yql(table: &str) -> String {
    format!(
        "DECLARE $key AS Utf8;\nDELETE FROM {} WHERE key = $key;",
        quote_table(table)
    )
}

/// YDB-backed session store
#[derive(Clone)]
pub struct YdbStore {
    table: String,
    gate: InitGate<Arc<Client>>,
}

impl YdbStore {
    /// Create the store; discovery and table setup start in the background
    pub fn new(options: YdbOptions) -> Self {
        let YdbOptions {
            connection,
            table,
            on_init_error,
        } = options;
        let setup_table = table.clone();
        let setup = async move {
            let client = match connection {
                Connection::New(config) => Arc::new(connect(config).await?),
                Connection::Existing(client) => client,
            };
            debug!(table = %setup_table, "Ensuring session table exists");
            client
                .table_client()
                .retry_execute_scheme_query(create_table_yql(&setup_table))
                .await
                .map_err(|err| StorageError::Setup(err.to_string()))?;
            Ok::<_, StorageError>(client)
        };
        Self {
            table,
            gate: InitGate::start("ydb", setup, on_init_error),
        }
    }

    /// Session table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Run one parameterized statement in its own transaction
    ///
    /// With `read` set, returns the `session` column of the first row.
    async fn execute(
        &self,
        yql: String,
        key: &str,
        session: Option<String>,
        read: bool,
    ) -> StorageResult<Option<String>> {
        let client = self.gate.wait().await?;
        let key = key.to_string();
        client
            .table_client()
            .retry_transaction(|tx| {
                let yql = yql.clone();
                let key = key.clone();
                let session = session.clone();
                async move {
                    let mut tx = tx;
                    let mut params = HashMap::from([("$key".to_string(), Value::Text(key))]);
                    if let Some(session) = session {
                        params.insert("$session".to_string(), Value::Text(session));
                    }
                    let result = tx.query(Query::new(yql).with_params(params)).await?;
                    let mut value: Option<String> = None;
                    if read {
                        if let Some(mut row) = result.into_only_result()?.rows().next() {
                            value = row.remove_field_by_name("session")?.try_into()?;
                        }
                    }
                    tx.commit().await?;
                    Ok(value)
                }
            })
            .await
            .map_err(|err| StorageError::Query(err.to_string()))
    }
}

async fn connect(config: YdbConfig) -> StorageResult<Client> {
    let mut builder = ClientBuilder::new_from_connection_string(config.connection_string())
        .map_err(|err| StorageError::Configuration(err.to_string()))?;
    if let Some(credentials) = &config.credentials {
        let endpoint = match config.endpoint.parse() {
            Ok(uri) => uri,
            Err(err) => {
                return Err(StorageError::Configuration(format!(
                    "invalid YDB endpoint {}: {}",
                    config.endpoint, err
                )))
            }
        };
        builder = builder.with_credentials(ydb::StaticCredentials::new(
            credentials.user.clone(),
            credentials.password.clone(),
            endpoint,
            config.database.clone(),
        ));
    }
    let client = builder
        .client()
        .map_err(|err| StorageError::Connection(err.to_string()))?;
    tokio::time::timeout(config.connection_timeout, client.wait())
        .await
        .map_err(|_| {
            StorageError::Connection(format!(
                "YDB discovery timed out after {:?}",
                config.connection_timeout
            ))
        })?
        .map_err(|err| StorageError::Connection(err.to_string()))?;
    Ok(client)
}

#[async_trait]
impl<T: SessionValue> SessionStore<T> for YdbStore {
    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        trace!(key, table = %self.table, "SELECT session");
        let raw = self.execute(select_yql(&self.table), key, None, true).await?;
        codec::decode_stored(raw)
    }

    async fn set(&self, key: &str, session: T) -> StorageResult<()> {
        let encoded = codec::encode(&session)?;
        trace!(key, table = %self.table, "UPSERT session");
        self.execute(upsert_yql(&self.table), key, Some(encoded), false)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        trace!(key, table = %self.table, "DELETE session");
        self.execute(delete_yql(&self.table), key, None, false).await?;
        Ok(())
    }
}
