//! Sync records and their store.

use crate::error::{SyncError, SyncResult};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use synkit_codec::{Entity, Key, PathElement, Principal, Value};
use synkit_storage::EntityStore;

/// Kind of the entities sync records are stored as.
pub const SYNC_INFO_KIND: &str = "SyncInfo";

const PROP_REMOTE_KEY: &str = "remote_key";
const PROP_VERSION: &str = "version";
const PROP_CONTENT_HASH: &str = "content_hash";
const PROP_TARGET_KEY: &str = "target_key";
const PROP_OWNER: &str = "owner";

/// Server-side bookkeeping for one remote key.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRecord {
    remote_key: String,
    version: u64,
    content_hash: String,
    target_key: Key,
    owner: Option<Principal>,
}

impl SyncRecord {
    /// Returns the remote key.
    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }

    /// Returns the current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the content hash of the last synced content.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Returns the key of the stored entity.
    pub fn target_key(&self) -> &Key {
        &self.target_key
    }

    /// Returns the owning principal.
    pub fn owner(&self) -> Option<&Principal> {
        self.owner.as_ref()
    }

    /// Returns true if `principal` may modify this record.
    ///
    /// Records without an owner are open to everyone.
    pub fn is_owned_by(&self, principal: Option<&Principal>) -> bool {
        match &self.owner {
            None => true,
            Some(owner) => principal == Some(owner),
        }
    }

    /// Increments the version and records the new content hash.
    ///
    /// This is the only way a record's version changes.
    pub fn advance(&mut self, content_hash: impl Into<String>) -> u64 {
        self.version += 1;
        self.content_hash = content_hash.into();
        self.version
    }

    fn to_entity(&self, key: Key) -> SyncResult<Entity> {
        let version = i64::try_from(self.version)
            .map_err(|_| SyncError::corrupt_record(record_name(&self.remote_key), "version overflow"))?;

        let mut entity = Entity::new(key);
        entity.set(PROP_REMOTE_KEY, Value::Text(self.remote_key.clone()));
        entity.set(PROP_VERSION, version);
        entity.set(PROP_CONTENT_HASH, self.content_hash.as_str());
        entity.set(PROP_TARGET_KEY, self.target_key.clone());
        if let Some(owner) = &self.owner {
            entity.set(PROP_OWNER, owner.clone());
        }
        Ok(entity)
    }

    fn from_entity(entity: &Entity) -> SyncResult<Self> {
        let name = entity.key().name().unwrap_or_default().to_string();
        let corrupt = |message: &str| SyncError::corrupt_record(name.clone(), message);

        let remote_key = entity
            .get(PROP_REMOTE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| corrupt("missing remote key"))?
            .to_string();
        let version = entity
            .get(PROP_VERSION)
            .and_then(Value::as_int)
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| corrupt("missing version"))?;
        let content_hash = entity
            .get(PROP_CONTENT_HASH)
            .and_then(Value::as_str)
            .ok_or_else(|| corrupt("missing content hash"))?
            .to_string();
        let target_key = entity
            .get(PROP_TARGET_KEY)
            .and_then(Value::as_key)
            .ok_or_else(|| corrupt("missing target key"))?
            .clone();
        let owner = entity.get(PROP_OWNER).and_then(Value::as_user).cloned();

        Ok(Self {
            remote_key,
            version,
            content_hash,
            target_key,
            owner,
        })
    }
}

/// Returns true if `key` or one of its ancestors has the record kind.
///
/// Client entities must never live in the record keyspace.
pub fn is_reserved_key(key: &Key) -> bool {
    key.path().any(|element| element.kind() == SYNC_INFO_KIND)
}

/// Returns true if `value` is, or contains, a reserved key.
pub fn holds_reserved_key(value: &Value) -> bool {
    match value {
        Value::Key(key) => is_reserved_key(key),
        Value::List(items) => items.iter().any(holds_reserved_key),
        _ => false,
    }
}

/// Key name of the record for `remote_key`: hex SHA-256 of the remote key.
pub fn record_name(remote_key: &str) -> String {
    hex::encode(Sha256::digest(remote_key.as_bytes()))
}

/// Persists [`SyncRecord`]s in an entity store.
///
/// Records are root-level entities of kind [`SYNC_INFO_KIND`] in the default
/// namespace, named by [`record_name`], so lookups of the same remote key
/// always hit the same entity.
pub struct SyncRecordStore<S: EntityStore> {
    store: Arc<S>,
    app_id: String,
}

impl<S: EntityStore> SyncRecordStore<S> {
    /// Creates a record store over `store` for the given application.
    pub fn new(store: Arc<S>, app_id: impl Into<String>) -> Self {
        Self {
            store,
            app_id: app_id.into(),
        }
    }

    fn record_key(&self, remote_key: &str) -> SyncResult<Key> {
        Ok(Key::root(
            self.app_id.as_str(),
            None,
            PathElement::new(SYNC_INFO_KIND, record_name(remote_key)),
        )?)
    }

    /// Looks up the record for a remote key.
    pub fn get_by_remote_key(&self, remote_key: &str) -> SyncResult<Option<SyncRecord>> {
        let key = self.record_key(remote_key)?;
        self.store
            .get(&key)?
            .map(|entity| SyncRecord::from_entity(&entity))
            .transpose()
    }

    /// Looks up the record for a remote key, failing if there is none.
    pub fn require(&self, remote_key: &str) -> SyncResult<SyncRecord> {
        self.get_by_remote_key(remote_key)?
            .ok_or_else(|| SyncError::RecordNotFound {
                remote_key: remote_key.to_string(),
            })
    }

    /// Creates and persists a record.
    ///
    /// A version of `0` is stored as `1`: no record ever carries the
    /// "never synced" version.
    pub fn create(
        &self,
        remote_key: &str,
        version: u64,
        content_hash: &str,
        target_key: Key,
        owner: Option<Principal>,
    ) -> SyncResult<SyncRecord> {
        let record = SyncRecord {
            remote_key: remote_key.to_string(),
            version: version.max(1),
            content_hash: content_hash.to_string(),
            target_key,
            owner,
        };
        self.save(&record)?;
        Ok(record)
    }

    /// Persists a record.
    pub fn save(&self, record: &SyncRecord) -> SyncResult<()> {
        let key = self.record_key(&record.remote_key)?;
        self.store.put(record.to_entity(key)?)?;
        Ok(())
    }

    /// Deletes a record. Deleting a missing record is not an error.
    pub fn delete(&self, record: &SyncRecord) -> SyncResult<bool> {
        let key = self.record_key(&record.remote_key)?;
        Ok(self.store.delete(&key)?)
    }

    /// Returns the stored entity key recorded for a remote key.
    pub fn target_key_for(&self, remote_key: &str) -> SyncResult<Option<Key>> {
        Ok(self
            .get_by_remote_key(remote_key)?
            .map(|record| record.target_key))
    }

    /// Lists every record of this application.
    pub fn list(&self) -> SyncResult<Vec<SyncRecord>> {
        self.store
            .scan_kind(None, SYNC_INFO_KIND)?
            .iter()
            .filter(|entity| entity.key().app_id() == self.app_id)
            .map(SyncRecord::from_entity)
            .collect()
    }

    /// Returns the underlying entity store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
