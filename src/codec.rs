//! JSON encoding of session payloads
//!
//! Text-column and string-value backends persist sessions as JSON. Document
//! backends store native values and do not go through here.

use crate::error::StorageResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a session to its stored JSON text
pub fn encode<T: Serialize>(session: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(session)?)
}

/// Parse stored JSON text back into a session
pub fn decode<T: DeserializeOwned>(raw: &str) -> StorageResult<T> {
    Ok(serde_json::from_str(raw)?)
}

/// Decode a possibly-missing stored value
///
/// A missing row, a NULL column and an empty string all read as absent.
pub fn decode_stored<T: DeserializeOwned>(raw: Option<String>) -> StorageResult<Option<T>> {
    match raw {
        Some(text) if !text.is_empty() => decode(&text).map(Some),
        _ => Ok(None),
    }
}
