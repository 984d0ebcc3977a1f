//! Error types for storage operations.

use std::io;
use synkit_codec::CodecError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The storage file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A stored key or value could not be converted.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The snapshot could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
