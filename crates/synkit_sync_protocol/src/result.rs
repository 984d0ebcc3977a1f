//! Results returned by the sync operations.

use crate::payload::EntityPayload;
use crate::status::SyncStatus;
use serde::{Deserialize, Serialize};

/// Result of `syncEntity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEntityResult {
    /// Outcome.
    pub status: SyncStatus,
    /// Current server version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Remote key the result refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Server entity, present for [`SyncStatus::Updated`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityPayload>,
}

impl SyncEntityResult {
    /// First-time store.
    pub fn stored(version: u64, key: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Stored,
            version: Some(version),
            key: Some(key.into()),
            entity: None,
        }
    }

    /// Hash matched; nothing written.
    pub fn not_changed(version: u64, key: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::NotChanged,
            version: Some(version),
            key: Some(key.into()),
            entity: None,
        }
    }

    /// The client must adopt `entity`.
    pub fn updated(version: u64, entity: EntityPayload) -> Self {
        Self {
            status: SyncStatus::Updated,
            version: Some(version),
            key: entity.key.clone(),
            entity: Some(entity),
        }
    }
}

/// Result of `syncDeletedEntity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDeletedResult {
    /// Either [`SyncStatus::Deleted`] or [`SyncStatus::NotFound`].
    pub status: SyncStatus,
}

impl SyncDeletedResult {
    /// The entity and record were removed.
    pub fn deleted() -> Self {
        Self {
            status: SyncStatus::Deleted,
        }
    }

    /// There was nothing to remove.
    pub fn not_found() -> Self {
        Self {
            status: SyncStatus::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_shape() {
        let result = SyncEntityResult::stored(1, "a2V5");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": 3, "version": 1, "key": "a2V5"})
        );
    }

    #[test]
    fn updated_carries_entity() {
        let entity = EntityPayload::new("Book", "a2V5").with_version(2u64);
        let value = serde_json::to_value(SyncEntityResult::updated(2, entity)).unwrap();
        assert_eq!(value["status"], json!(2));
        assert_eq!(value["entity"]["kind"], json!("Book"));
        assert_eq!(value["entity"]["version"], json!(2));
        assert_eq!(value["key"], json!("a2V5"));
    }

    #[test]
    fn deleted_shape() {
        assert_eq!(
            serde_json::to_value(SyncDeletedResult::deleted()).unwrap(),
            json!({"status": 5})
        );
        assert_eq!(
            serde_json::to_value(SyncDeletedResult::not_found()).unwrap(),
            json!({"status": 4})
        );
    }
}
