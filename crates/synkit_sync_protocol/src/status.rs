//! Sync status codes.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Outcome of a sync call, sent to clients as a stable integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// The client's content hash matches; nothing was written.
    NotChanged,
    /// The reply carries the server's entity, merged or authoritative.
    Updated,
    /// The entity was stored for the first time.
    Stored,
    /// Deletion of a key the server never synced.
    NotFound,
    /// The entity and its sync record were deleted.
    Deleted,
}

impl SyncStatus {
    /// Converts to a code.
    pub fn to_code(&self) -> u8 {
        match self {
            SyncStatus::NotChanged => 1,
            SyncStatus::Updated => 2,
            SyncStatus::Stored => 3,
            SyncStatus::NotFound => 4,
            SyncStatus::Deleted => 5,
        }
    }

    /// Converts from a code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SyncStatus::NotChanged),
            2 => Some(SyncStatus::Updated),
            3 => Some(SyncStatus::Stored),
            4 => Some(SyncStatus::NotFound),
            5 => Some(SyncStatus::Deleted),
            _ => None,
        }
    }

    /// Returns the conventional upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            SyncStatus::NotChanged => "NOT_CHANGED",
            SyncStatus::Updated => "UPDATED",
            SyncStatus::Stored => "STORED",
            SyncStatus::NotFound => "NOT_FOUND",
            SyncStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for SyncStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.to_code())
    }
}

impl<'de> Deserialize<'de> for SyncStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        SyncStatus::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("unknown sync status {code}")))
    }
}
