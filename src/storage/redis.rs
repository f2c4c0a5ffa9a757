//! Redis session store
//!
//! Sessions are stored as JSON strings under `prefix + key`, so several bots
//! (or unrelated data) can share one keyspace.

use crate::codec;
use crate::config::{Connection, ErrorCallback, DEFAULT_PREFIX, DEFAULT_REDIS_URL};
use crate::error::{StorageError, StorageResult};
use crate::init::InitGate;
use crate::keys;
use crate::storage::{SessionStore, SessionValue};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::trace;

/// Parameters for a self-constructed Redis connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// `redis[s]://[[username][:password]@][host][:port][/db-number]`
    pub url: String,
}

impl RedisConfig {
    /// Connect to `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REDIS_URL)
    }
}

/// Options for [`RedisStore::new`]
#[derive(Clone)]
pub struct RedisOptions {
    /// Connection parameters, or a caller-owned connection manager
    pub connection: Connection<RedisConfig, ConnectionManager>,
    /// Prepended to every session key
    pub prefix: String,
    /// Called once if connecting fails
    pub on_init_error: Option<ErrorCallback>,
}

impl RedisOptions {
    /// Let the store open its own connection
    pub fn new(config: RedisConfig) -> Self {
        Self {
            connection: Connection::New(config),
            prefix: DEFAULT_PREFIX.to_string(),
            on_init_error: None,
        }
    }

    /// Reuse a caller-owned connection manager
    pub fn existing(manager: ConnectionManager) -> Self {
        Self {
            connection: Connection::Existing(manager),
            prefix: DEFAULT_PREFIX.to_string(),
            on_init_error: None,
        }
    }

    /// Set the key prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Register a callback for connection failures
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StorageError) + Send + Sync + 'static,
    {
        self.on_init_error = Some(Arc::new(handler));
        self
    }
}

/// Redis-backed session store
#[derive(Clone)]
pub struct RedisStore {
    prefix: String,
    gate: InitGate<ConnectionManager>,
}

impl RedisStore {
    /// Create the store; the connection is established in the background
    pub fn new(options: RedisOptions) -> Self {
        let RedisOptions {
            connection,
            prefix,
            on_init_error,
        } = options;
        let gate = match connection {
            Connection::Existing(manager) => InitGate::ready(manager),
            Connection::New(config) => InitGate::start(
                "redis",
                async move {
                    let client = redis::Client::open(config.url.as_str())
                        .map_err(|err| StorageError::Configuration(err.to_string()))?;
                    let manager = ConnectionManager::new(client)
                        .await
                        .map_err(|err| StorageError::Connection(err.to_string()))?;
                    Ok::<_, StorageError>(manager)
                },
                on_init_error,
            ),
        };
        Self { prefix, gate }
    }

    /// Key prefix in use
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn redis_key(&self, key: &str) -> String {
        keys::prefixed(&self.prefix, key)
    }
}

#[async_trait]
impl<T: SessionValue> SessionStore<T> for RedisStore {
    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        let mut conn = self.gate.wait().await?;
        let redis_key = self.redis_key(key);
        trace!(key = %redis_key, "GET session");
        let raw: Option<String> = conn.get(&redis_key).await?;
        codec::decode_stored(raw)
    }

    async fn set(&self, key: &str, session: T) -> StorageResult<()> {
        let encoded = codec::encode(&session)?;
        let mut conn = self.gate.wait().await?;
        let redis_key = self.redis_key(key);
        trace!(key = %redis_key, "SET session");
        conn.set::<_, _, ()>(&redis_key, encoded).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut conn = self.gate.wait().await?;
        let redis_key = self.redis_key(key);
        trace!(key = %redis_key, "DEL session");
        conn.del::<_, ()>(&redis_key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = RedisOptions::new(RedisConfig::default());
        assert_eq!(options.prefix, "telegraf:");
        match &options.connection {
            Connection::New(config) => assert_eq!(config.url, DEFAULT_REDIS_URL),
            Connection::Existing(_) => panic!("expected a new connection"),
        }
    }

    #[tokio::test]
    async fn test_keys_are_prefixed() {
        let store = RedisStore::new(
            RedisOptions::new(RedisConfig::new("redis://127.0.0.1:1")).with_prefix("bot:"),
        );
        assert_eq!(store.prefix(), "bot:");
        assert_eq!(store.redis_key("42:7"), "bot:42:7");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_operations() {
        let store = RedisStore::new(RedisOptions::new(RedisConfig::new("not-a-redis-url")));
        let result: StorageResult<Option<String>> = store.get("k").await;
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }
}
