//! Session storage backends
//!
//! This module provides trait-based abstraction for session storage,
//! allowing different backend implementations (in-memory, SQL, MongoDB,
//! Redis, YDB, SurrealDB) to be swapped behind one contract.

use crate::error::StorageResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub mod memory;
pub mod sql;

#[cfg(feature = "mongodb")]
pub mod mongo;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "surrealdb")]
pub mod surreal;

#[cfg(feature = "ydb")]
pub mod ydb;

/// Values that can be persisted as a session
///
/// Anything serde can round-trip through JSON qualifies; implemented
/// automatically.
pub trait SessionValue: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> SessionValue for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Trait for session storage backends
///
/// Keys are opaque strings chosen by the caller. Every operation may have to
/// wait for the backend's one-time connect/setup phase before it runs.
#[async_trait]
pub trait SessionStore<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Get the session stored under `key`
    ///
    /// # Returns
    ///
    /// The session if found, None if not found, or a storage error
    async fn get(&self, key: &str) -> StorageResult<Option<T>>;

    /// Store `session` under `key`, replacing any previous value
    async fn set(&self, key: &str, session: T) -> StorageResult<()>;

    /// Remove the session stored under `key`
    ///
    /// Deleting a key that has no session is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Shared, type-erased session store
pub type SharedSessionStore<T> = Arc<dyn SessionStore<T>>;

