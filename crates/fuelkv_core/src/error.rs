//! Error types for fuelkv stores.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Byte storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] fuelkv_storage::StorageError),

    /// Record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] fuelkv_codec::CodecError),

    /// SQLite error from the relational backend.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The file is not a store of the expected kind, or its header is damaged.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A read-only open was requested for a file that does not exist.
    #[error("store not found: {}", path.display())]
    NotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// Key absent from the store.
    ///
    /// For batched relational reads the payload is the query that came back
    /// short, not a single key.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The missing key, or the failing batch query.
        key: String,
    },

    /// A mutation was attempted on a read-only handle.
    #[error("store is read-only: cannot {operation}")]
    ReadOnly {
        /// The rejected operation.
        operation: &'static str,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A descriptor could not be produced or turned back into a handle.
    #[error("handle transfer failed: {message}")]
    HandleTransfer {
        /// Description of the failure.
        message: String,
    },

    /// The handle has been closed.
    #[error("store is closed")]
    Closed,

    /// The mapped index could not be loaded.
    #[error("index load failed: {message}")]
    IndexLoad {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a read-only violation error.
    pub fn read_only(operation: &'static str) -> Self {
        Self::ReadOnly { operation }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a handle transfer error.
    pub fn handle_transfer(message: impl Into<String>) -> Self {
        Self::HandleTransfer {
            message: message.into(),
        }
    }

    /// Creates an index load error.
    pub fn index_load(message: impl Into<String>) -> Self {
        Self::IndexLoad {
            message: message.into(),
        }
    }

    /// Returns `true` for a missing key.
    #[must_use]
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    /// Returns `true` for a rejected mutation on a read-only handle.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        assert_eq!(
            StoreError::key_not_found("a").to_string(),
            "key not found: a"
        );
        assert_eq!(
            StoreError::read_only("set").to_string(),
            "store is read-only: cannot set"
        );
        assert_eq!(
            StoreError::not_found("/tmp/x.db").to_string(),
            "store not found: /tmp/x.db"
        );
    }

    #[test]
    fn predicates() {
        assert!(StoreError::key_not_found("k").is_key_not_found());
        assert!(StoreError::read_only("clear").is_read_only());
        assert!(!StoreError::Closed.is_read_only());
    }
}
