//! Error types for the snapshot codec, the relational store and the
//! service layer that combines them.
//!
//! The codec distinguishes a malformed stream ([`SnapshotError::MalformedStream`],
//! the only kind that triggers the legacy fallback) from every other
//! failure. The relational store reports [`StoreError::Unavailable`] when
//! the connection could not be re-established, so callers can tell an
//! unreachable store apart from a missing row.

use std::time::Duration;

/// Failure raised by the legacy decoder capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("legacy format error: {message}")]
pub struct LegacyFormatError {
    message: String,
}

impl LegacyFormatError {
    /// Creates a new error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure raised when a decoded snapshot cannot be restored into a live
/// domain object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("restore failed: {message}")]
pub struct RestoreError {
    message: String,
}

impl RestoreError {
    /// Creates a new error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Snapshot encode/decode failure.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Decompressed content is not a syntactically valid document.
    ///
    /// Usually means the blob was written by an older version.
    #[error("malformed snapshot stream: {0}")]
    MalformedStream(String),

    /// The document parsed but has no value under the root key.
    #[error("serialized data not found under root key `{0}`")]
    MissingRoot(String),

    /// The root value does not match the requested payload type.
    #[error("snapshot payload has unexpected shape: {0}")]
    Payload(#[source] serde_json::Error),

    /// The payload could not be serialized.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The string form is not valid base64.
    #[error("invalid snapshot encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Stream or storage failure (disk, truncated gzip stream).
    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The legacy decoder rejected the input after the modern decoder did.
    #[error(transparent)]
    Legacy(#[from] LegacyFormatError),

    /// The decoded snapshot could not be restored.
    #[error(transparent)]
    Restore(#[from] RestoreError),
}

impl SnapshotError {
    /// Returns `true` if this error should send the input to the legacy
    /// decoder.
    #[must_use]
    pub const fn is_malformed_stream(&self) -> bool {
        matches!(self, Self::MalformedStream(_))
    }
}

/// Relational store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No connection could be (re-)established.
    #[error("relational store unavailable")]
    Unavailable,

    /// Opening a connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// A statement failed on an open connection.
    #[error("statement failed: {0}")]
    Query(String),

    /// A connect or statement exceeded its time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered a statement with the wrong response shape.
    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Query(err.to_string())
    }
}

/// Service-level failure combining codec and store errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Encoding, decoding or file access failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The relational store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_malformed_stream_triggers_fallback() {
        assert!(SnapshotError::MalformedStream("bad".to_string()).is_malformed_stream());
        assert!(!SnapshotError::MissingRoot("data".to_string()).is_malformed_stream());
        assert!(!SnapshotError::Legacy(LegacyFormatError::new("x")).is_malformed_stream());
    }

    #[test]
    fn legacy_error_is_reported_verbatim() {
        let err = SnapshotError::from(LegacyFormatError::new("unknown header"));
        assert_eq!(err.to_string(), "legacy format error: unknown header");
    }

    #[test]
    fn unavailable_is_distinct_from_query_failure() {
        let unavailable = StoreError::Unavailable;
        let query = StoreError::Query("syntax".to_string());
        assert_ne!(unavailable.to_string(), query.to_string());
        assert!(matches!(
            PersistenceError::from(unavailable),
            PersistenceError::Store(StoreError::Unavailable)
        ));
    }
}
