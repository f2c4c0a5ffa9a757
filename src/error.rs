//! Error types for session storage
//!
//! Every variant carries a rendered message rather than the driver error itself,
//! so a failed setup can be cached once and handed to every waiting operation.

use thiserror::Error;

/// Storage-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    /// Connection failed
    #[error("Storage connection failed: {0}")]
    Connection(String),

    /// Query failed
    #[error("Storage query failed: {0}")]
    Query(String),

    /// Serialization failed
    #[error("Storage serialization failed: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Storage deserialization failed: {0}")]
    Deserialization(String),

    /// Invalid store configuration
    #[error("Storage configuration invalid: {0}")]
    Configuration(String),

    /// One-time table/collection setup failed
    #[error("Storage setup failed: {0}")]
    Setup(String),

    /// Internal storage error
    #[error("Internal storage error: {0}")]
    Internal(String),
}

/// Type alias for Storage Result
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::Deserialization(err.to_string())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => Self::Configuration(e.to_string()),
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            sqlx::Error::Tls(e) => Self::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Connection(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Deserialization(err.to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::Connection(err.to_string())
        } else {
            Self::Query(err.to_string())
        }
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Query(err.to_string())
    }
}

#[cfg(feature = "surrealdb")]
impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Query(err.to_string())
    }
}

#[cfg(feature = "ydb")]
impl From<ydb::YdbError> for StorageError {
    fn from(err: ydb::YdbError) -> Self {
        Self::Query(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection("connection refused".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Storage connection failed"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn test_setup_error_display() {
        let err = StorageError::Setup("table missing".to_string());
        assert_eq!(err.to_string(), "Storage setup failed: table missing");
    }

    #[test]
    fn test_malformed_json_maps_to_deserialization() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let storage_err: StorageError = err.into();
        assert!(matches!(storage_err, StorageError::Deserialization(_)));
    }

    #[test]
    fn test_wrong_shape_maps_to_deserialization() {
        let err = serde_json::from_str::<u32>("\"text\"").unwrap_err();
        let storage_err: StorageError = err.into();
        assert!(matches!(storage_err, StorageError::Deserialization(_)));
    }

    #[test]
    fn test_error_is_cloneable() {
        let err = StorageError::Query("boom".to_string());
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_storage_result() -> StorageResult<()> {
            Ok(())
        }

        assert!(returns_storage_result().is_ok());
    }
}
