//! MongoDB session store
//!
//! Each session is a document `{ key, session }` with the session kept as a
//! native BSON value. A unique index on `key` keeps one document per key.

use crate::config::{Connection, ErrorCallback, DEFAULT_MONGO_DATABASE, DEFAULT_TABLE};
use crate::error::{StorageError, StorageResult};
use crate::init::InitGate;
use crate::storage::{SessionStore, SessionValue};
use async_trait::async_trait;
use mongodb::bson::{self, doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use std::sync::Arc;
use tracing::{debug, trace};

/// Parameters for a self-constructed MongoDB client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// `mongodb://` or `mongodb+srv://` connection URL
    pub url: String,
    /// Database name; falls back to the one in the URL, then `"test"`
    pub database: Option<String>,
}

impl MongoConfig {
    /// Connect to `url`, using the database named in it
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: None,
        }
    }

    /// Use `database` regardless of the URL
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Options for [`MongoStore::new`]
#[derive(Clone)]
pub struct MongoOptions {
    /// Client parameters, or a caller-owned client
    pub connection: Connection<MongoConfig, Client>,
    /// Database used with an existing client; defaults to the client's own
    pub database: Option<String>,
    /// Collection holding the session documents
    pub collection: String,
    /// Called once if connecting or creating the index fails
    pub on_init_error: Option<ErrorCallback>,
}

impl MongoOptions {
    /// Let the store build its own client
    pub fn new(config: MongoConfig) -> Self {
        Self {
            database: config.database.clone(),
            connection: Connection::New(config),
            collection: DEFAULT_TABLE.to_string(),
            on_init_error: None,
        }
    }

    /// Reuse a caller-owned client
    pub fn existing(client: Client) -> Self {
        Self {
            connection: Connection::Existing(client),
            database: None,
            collection: DEFAULT_TABLE.to_string(),
            on_init_error: None,
        }
    }

    /// Select the database explicitly
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Override the collection name
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
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

/// MongoDB-backed session store
#[derive(Clone)]
pub struct MongoStore {
    gate: InitGate<Collection<Document>>,
}

impl MongoStore {
    /// Create the store; connecting and index setup start in the background
    pub fn new(options: MongoOptions) -> Self {
        let MongoOptions {
            connection,
            database,
            collection,
            on_init_error,
        } = options;
        let setup = async move {
            let client = match connection {
                Connection::New(config) => Client::with_uri_str(&config.url)
                    .await
                    .map_err(|err| StorageError::Connection(err.to_string()))?,
                Connection::Existing(client) => client,
            };
            let db = match database {
                Some(name) => client.database(&name),
                None => client
                    .default_database()
                    .unwrap_or_else(|| client.database(DEFAULT_MONGO_DATABASE)),
            };
            let sessions = db.collection::<Document>(&collection);
            ensure_key_index(&sessions).await?;
            Ok::<_, StorageError>(sessions)
        };
        Self {
            gate: InitGate::start("mongodb", setup, on_init_error),
        }
    }
}

async fn ensure_key_index(sessions: &Collection<Document>) -> StorageResult<()> {
    debug!(collection = sessions.name(), "Ensuring unique key index");
    let index = IndexModel::builder()
        .keys(doc! { "key": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    sessions
        .create_index(index)
        .await
        .map_err(|err| StorageError::Setup(err.to_string()))?;
    Ok(())
}

/// Pull the session out of a stored document; a missing field reads as absent
fn session_from_document<T: SessionValue>(mut document: Document) -> StorageResult<Option<T>> {
    match document.remove("session") {
        None => Ok(None),
        Some(value) => bson::from_bson(value)
            .map(Some)
            .map_err(|err| StorageError::Deserialization(err.to_string())),
    }
}

#[async_trait]
impl<T: SessionValue> SessionStore<T> for MongoStore {
    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        let sessions = self.gate.wait().await?;
        trace!(key, "findOne session");
        match sessions.find_one(doc! { "key": key }).await? {
            Some(document) => session_from_document(document),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, session: T) -> StorageResult<()> {
        let value =
            bson::to_bson(&session).map_err(|err| StorageError::Serialization(err.to_string()))?;
        let sessions = self.gate.wait().await?;
        trace!(key, "updateOne session (upsert)");
        sessions
            .update_one(
                doc! { "key": key },
                doc! { "$set": { "key": key, "session": value } },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let sessions = self.gate.wait().await?;
        trace!(key, "deleteOne session");
        sessions.delete_one(doc! { "key": key }).await?;
        Ok(())
    }
}
