//! In-memory session storage implementation
//!
//! This module provides a thread-safe, in-memory implementation of the SessionStore trait
//! using a HashMap protected by an async RwLock.

use crate::error::StorageResult;
use crate::storage::SessionStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// In-memory session storage implementation
///
/// Sessions are kept as values, without serialization, in a map shared by
/// every clone of the store. Nothing survives the process. It's suitable for
/// development, testing, and single-instance bots.
///
/// # Examples
///
/// ```
/// use talk_sessions::{MemoryStore, SessionStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::<u32>::new();
///     store.set("chat:1", 3).await?;
///
///     assert_eq!(store.get("chat:1").await?, Some(3));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MemoryStore<T> {
    sessions: Arc<RwLock<HashMap<String, T>>>,
}

impl<T> MemoryStore<T> {
    /// Create a new in-memory session store
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of sessions currently stored
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Clear all sessions from the store
    ///
    /// This is primarily useful for testing purposes.
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> SessionStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(key).cloned())
    }

    async fn set(&self, key: &str, session: T) -> StorageResult<()> {
        trace!(key, "Storing session in memory");
        self.sessions.write().await.insert(key.to_string(), session);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        trace!(key, "Removing session from memory");
        self.sessions.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_set_and_get_session() {
        let store = MemoryStore::new();
        store.set("u1", json!({ "count": 1 })).await.unwrap();

        let retrieved = store.get("u1").await.unwrap();
        assert_eq!(retrieved, Some(json!({ "count": 1 })));
    }

    #[tokio::test]
    async fn test_get_nonexistent_session() {
        let store = MemoryStore::<Value>::new();

        let retrieved = store.get("missing").await.unwrap();
        assert!(retrieved.is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_session() {
        let store = MemoryStore::new();
        store.set("u1", json!({ "count": 1 })).await.unwrap();
        store.set("u1", json!({ "count": 2 })).await.unwrap();

        assert_eq!(store.get("u1").await.unwrap(), Some(json!({ "count": 2 })));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let store = MemoryStore::new();
        store.set("u1", json!({ "count": 1 })).await.unwrap();
        store.delete("u1").await.unwrap();

        let retrieved = store.get("u1").await.unwrap();
        assert!(retrieved.is_none());
    }

    #[tokio::test]
    async fn test_delete_nonexistent_session() {
        let store = MemoryStore::<Value>::new();

        let result = store.delete("missing").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryStore::new();
        store.set("a", 1u32).await.unwrap();
        store.set("b", 2u32).await.unwrap();
        store.delete("a").await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_len_and_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.len().await, 0);

        store.set("a", "x".to_string()).await.unwrap();
        assert!(!store.is_empty().await);
        assert_eq!(store.len().await, 1);

        store.set("b", "y".to_string()).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryStore::new();
        store.set("a", 1u8).await.unwrap();
        store.set("b", 2u8).await.unwrap();

        assert_eq!(store.len().await, 2);

        store.clear().await;
        assert!(store.is_empty().await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let store = MemoryStore::<i32>::new();
        let store_clone1 = store.clone();
        let store_clone2 = store.clone();

        let handle1 = tokio::spawn(async move {
            for i in 0..10 {
                store_clone1.set(&format!("left:{}", i), i).await.unwrap();
            }
        });

        let handle2 = tokio::spawn(async move {
            for i in 0..10 {
                store_clone2.set(&format!("right:{}", i), i).await.unwrap();
            }
        });

        handle1.await.unwrap();
        handle2.await.unwrap();

        assert_eq!(store.len().await, 20);
        assert_eq!(store.get("right:9").await.unwrap(), Some(9));
    }
}
