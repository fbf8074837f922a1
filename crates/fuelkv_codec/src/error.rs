//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Indefinite-length items are not produced and not accepted.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Invalid UTF-8 in a text item.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Input ended in the middle of an item.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The bytes do not form a valid record.
    #[error("invalid record structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// The record uses a type this codec does not support.
    #[error("unsupported record type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// A declared length is larger than the decoder is willing to allocate.
    #[error("declared size {claimed} exceeds limit {max_allowed}")]
    SizeLimitExceeded {
        /// Length declared in the input.
        claimed: u64,
        /// Maximum accepted length.
        max_allowed: u64,
    },

    /// Bytes remained after a complete record was decoded.
    #[error("{remaining} trailing bytes after record")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}
