//! # Talk Sessions - Pluggable Session Stores for Chat Bots
//!
//! A bot framework keeps a small piece of state per conversation. This crate
//! defines one contract for persisting it, [`SessionStore`], and thin adapters
//! that implement it on top of common databases.
//!
//! ## Features
//!
//! - 🔑 **One contract**: `get` / `set` / `delete` keyed by an opaque string
//! - 💾 **Backends**: in-memory, PostgreSQL, MySQL, SQLite, MongoDB, Redis, YDB, SurrealDB
//! - ⚡ **Non-blocking construction**: stores are returned immediately; connecting and
//!   table setup run once in the background and every operation waits for them
//! - 🛡️ **Parameterized queries**: keys and sessions are always bound, never spliced into SQL
//!
//! ## Quick Start
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use talk_sessions::{MemoryStore, SessionStore};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Counter {
//!     count: u32,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> talk_sessions::StorageResult<()> {
//! let store = MemoryStore::new();
//! store.set("u1", Counter { count: 1 }).await?;
//! assert_eq!(store.get("u1").await?, Some(Counter { count: 1 }));
//!
//! store.delete("u1").await?;
//! assert_eq!(store.get("u1").await?, None);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! | Store | Cargo feature | Stored as |
//! |-------|---------------|-----------|
//! | [`MemoryStore`] | always | native value |
//! | [`sql::SqlStore`] (+ `postgres`, `mysql`, `sqlite` factories) | `postgres` / `mysql` / `sqlite` | `(key, session)` row, JSON text |
//! | `storage::mongo::MongoStore` | `mongodb` | `{ key, session }` document |
//! | `storage::redis::RedisStore` | `redis` | `prefix + key` → JSON text |
//! | `storage::ydb::YdbStore` | `ydb` | `(key, session)` row, JSON text |
//! | `storage::surreal::SurrealStore` | `surrealdb` | record with native `value` |
//!
//! Every adapter accepts either connection parameters
//! ([`Connection::New`]) or a client the caller already owns
//! ([`Connection::Existing`]), and an optional callback for setup failures.
//!
//! ## Module Overview
//!
//! - [`storage`]: the contract and all adapters
//! - [`init`]: the one-time connect/bootstrap gate
//! - [`config`]: defaults, connection union and [`BackendConfig`]
//! - [`codec`]: JSON encoding of session payloads
//! - [`keys`]: key prefixing and record-id escaping
//! - [`error`]: error types and result aliases
//!
//! ## License
//!
//! Licensed under either of Apache License 2.0 or MIT license at your option.

#![warn(missing_docs)]

// Error types
pub mod error;

// Defaults and store configuration
pub mod config;

// Session payload encoding
pub mod codec;

// Backend key mapping
pub mod keys;

// One-time setup gate
pub mod init;

// Storage contract and backends
pub mod storage;

pub use config::{BackendConfig, Connection, ErrorCallback, DEFAULT_PREFIX, DEFAULT_TABLE};
pub use error::{StorageError, StorageResult};
pub use storage::memory::MemoryStore;
pub use storage::sql;
pub use storage::{SessionStore, SessionValue, SharedSessionStore};
