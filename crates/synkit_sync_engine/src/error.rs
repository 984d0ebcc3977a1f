//! Error types for the sync engine.

use std::fmt;
use synkit_codec::CodecError;
use synkit_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Which write of a deletion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStage {
    /// Deleting the target entity.
    Target,
    /// Deleting the sync record.
    Record,
}

impl fmt::Display for DeleteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteStage::Target => f.write_str("target entity"),
            DeleteStage::Record => f.write_str("sync record"),
        }
    }
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The payload carries no remote key.
    #[error("missing remote key")]
    MissingKey,

    /// The record belongs to another principal.
    #[error("not allowed to sync {remote_key}")]
    NotAllowed {
        /// Remote key of the record.
        remote_key: String,
    },

    /// The client declared a version the server never issued.
    #[error("version conflict for {remote_key}: client={client}, stored={stored}")]
    VersionConflict {
        /// Remote key of the record.
        remote_key: String,
        /// Version declared by the client.
        client: u64,
        /// Version held by the server.
        stored: u64,
    },

    /// One of the two deletion writes failed. Repeating the call completes it.
    #[error("deleting {stage} of {remote_key} failed: {reason}")]
    DeletePartialFailure {
        /// Remote key of the record.
        remote_key: String,
        /// The write that failed.
        stage: DeleteStage,
        /// Underlying failure.
        reason: String,
    },

    /// No sync record exists for the remote key.
    #[error("no sync record for {remote_key}")]
    RecordNotFound {
        /// Remote key that was looked up.
        remote_key: String,
    },

    /// The parent of a first-time entity has not been synced yet.
    #[error("parent of {remote_key} is not synced yet")]
    UnresolvedParent {
        /// Remote key of the child.
        remote_key: String,
    },

    /// The record references an entity that no longer exists.
    #[error("target entity of {remote_key} is missing")]
    MissingTarget {
        /// Remote key of the record.
        remote_key: String,
    },

    /// A stored sync record could not be read back.
    #[error("corrupt sync record {name}: {message}")]
    CorruptRecord {
        /// Key name of the record entity.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// Key or value codec error.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Entity store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Creates a corrupt record error.
    pub fn corrupt_record(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns a stable machine-readable name for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::MissingKey => "MissingKey",
            SyncError::NotAllowed { .. } => "NotAllowed",
            SyncError::VersionConflict { .. } => "VersionConflict",
            SyncError::DeletePartialFailure { .. } => "DeletePartialFailure",
            SyncError::RecordNotFound { .. } => "RecordNotFound",
            SyncError::UnresolvedParent { .. } => "UnresolvedParent",
            SyncError::MissingTarget { .. } => "MissingTarget",
            SyncError::CorruptRecord { .. } => "CorruptRecord",
            SyncError::Codec(CodecError::MalformedKey { .. }) => "MalformedKey",
            SyncError::Codec(CodecError::AccessDenied { .. }) => "AccessDenied",
            SyncError::Codec(CodecError::UnsupportedType { .. }) => "UnsupportedType",
            SyncError::Codec(CodecError::MalformedValue { .. }) => "MalformedValue",
            SyncError::Storage(_) => "StorageError",
        }
    }

    /// Returns true if the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SyncError::MissingKey
                | SyncError::NotAllowed { .. }
                | SyncError::VersionConflict { .. }
                | SyncError::RecordNotFound { .. }
                | SyncError::UnresolvedParent { .. }
                | SyncError::Codec(_)
        )
    }

    /// Returns true if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::DeletePartialFailure { .. } | SyncError::UnresolvedParent { .. } => true,
            SyncError::Storage(err) => matches!(
                err,
                StorageError::Io(_) | StorageError::Unavailable(_)
            ),
            _ => false,
        }
    }
}
