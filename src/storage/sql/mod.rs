//! Relational session stores
//!
//! [`SqlStore`] is the generic adapter: it speaks PostgreSQL, MySQL or SQLite
//! depending on the pool it is given (or the scheme of the URL it connects
//! to). The `postgres`, `mysql` and `sqlite` factories are thin
//! specializations that take each driver's native connect options.

mod dialect;

pub use dialect::Dialect;

#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
mod store;

#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
pub use store::{SqlConfig, SqlOptions, SqlPool, SqlStore};

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;
