//! The sync state machine.

use crate::config::EngineConfig;
use crate::error::{DeleteStage, SyncError, SyncResult};
use crate::locks::KeyLocks;
use crate::record::{
    holds_reserved_key, is_reserved_key, SyncRecord, SyncRecordStore, SYNC_INFO_KIND,
};
use parking_lot::RwLock;
use std::sync::Arc;
use synkit_codec::{
    resolve_parent, CodecError, Entity, Key, ParentResolution, PathElement, Principal,
    Properties, PropertyCodec,
};
use synkit_storage::EntityStore;
use synkit_sync_protocol::{EntityPayload, SyncDeletedResult, SyncEntityResult};
use tracing::{debug, info, warn};

/// Counters of per-request outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// First-time stores.
    pub stored: u64,
    /// Content-hash hits.
    pub not_changed: u64,
    /// Field-level merges at equal versions.
    pub merged: u64,
    /// Stale clients sent the server's entity.
    pub stale: u64,
    /// Requests rejected with a version conflict.
    pub conflicts: u64,
    /// Completed deletions.
    pub deleted: u64,
    /// Deletions of keys without a record.
    pub not_found: u64,
}

/// Applies `syncEntity` and `syncDeletedEntity` requests to an entity store.
///
/// Every request re-reads the sync record; nothing is cached between
/// requests. Requests for the same remote key are serialized through
/// [`KeyLocks`], requests for different keys run in parallel.
pub struct SyncEngine<S: EntityStore> {
    config: EngineConfig,
    store: Arc<S>,
    records: SyncRecordStore<S>,
    codec: PropertyCodec,
    locks: KeyLocks,
    stats: RwLock<EngineStats>,
}

impl<S: EntityStore> SyncEngine<S> {
    /// Creates an engine that owns `store`.
    pub fn new(config: EngineConfig, store: S) -> Self {
        Self::with_shared_store(config, Arc::new(store))
    }

    /// Creates an engine over a store shared with other users.
    pub fn with_shared_store(config: EngineConfig, store: Arc<S>) -> Self {
        Self {
            records: SyncRecordStore::new(Arc::clone(&store), config.app_id.as_str()),
            codec: PropertyCodec::new(config.app_id.as_str()),
            locks: KeyLocks::new(config.lock_stripes),
            stats: RwLock::new(EngineStats::default()),
            store,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the entity store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the sync record store.
    pub fn records(&self) -> &SyncRecordStore<S> {
        &self.records
    }

    /// Returns outcome counters since creation.
    pub fn stats(&self) -> EngineStats {
        *self.stats.read()
    }

    /// Synchronizes one client entity.
    ///
    /// `content_hash` is compared verbatim with the hash stored at the last
    /// sync. `principal` is the authenticated caller, if any. Records are
    /// looked up by the canonical encoding of the client key; replies carry
    /// the key string exactly as the client sent it.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MissingKey`] if the payload has no remote key
    /// - codec errors if the key, the declared version or a property cannot
    ///   be decoded, or if the key lies in the record keyspace
    /// - [`SyncError::NotAllowed`] if the record belongs to someone else
    /// - [`SyncError::VersionConflict`] if the client is ahead of the server
    /// - [`SyncError::UnresolvedParent`] on first sync below an unsynced parent
    pub fn sync_entity(
        &self,
        payload: &EntityPayload,
        content_hash: &str,
        principal: Option<&Principal>,
    ) -> SyncResult<SyncEntityResult> {
        let sent_key = payload.remote_key().ok_or_else(|| {
            warn!("syncEntity without remote key");
            SyncError::MissingKey
        })?;
        let client_key = payload.decode_key(&self.config.app_id)?;
        reject_reserved(&client_key)?;
        let declared = payload.declared_version()?;
        let remote_key = client_key.to_remote();
        let remote_key = remote_key.as_str();

        let _guard = self.locks.lock(remote_key);

        let Some(mut record) = self.records.get_by_remote_key(remote_key)? else {
            debug!(remote_key, declared, "no sync record, storing");
            return self.store_new(
                payload,
                sent_key,
                &client_key,
                declared,
                content_hash,
                principal,
            );
        };

        self.check_owner(&record, principal)?;

        if record.content_hash() == content_hash {
            debug!(remote_key, version = record.version(), "content hash unchanged");
            self.stats.write().not_changed += 1;
            return Ok(SyncEntityResult::not_changed(record.version(), sent_key));
        }

        let stored = record.version();
        if declared > stored {
            warn!(remote_key, declared, stored, "client version ahead of server");
            self.stats.write().conflicts += 1;
            return Err(SyncError::VersionConflict {
                remote_key: remote_key.to_string(),
                client: declared,
                stored,
            });
        }

        let mut entity = self.load_target(&record)?;

        if declared < stored {
            debug!(remote_key, declared, stored, "client is stale, returning server entity");
            self.stats.write().stale += 1;
            let reply = EntityPayload::from_entity(&client_key, sent_key, stored, &entity)?;
            return Ok(SyncEntityResult::updated(stored, reply));
        }

        let incoming = self.decode_properties(payload)?;
        debug!(remote_key, version = stored, properties = incoming.len(), "merging");
        entity.merge(incoming);
        self.store.put(entity.clone())?;
        let version = record.advance(content_hash);
        self.records.save(&record)?;

        info!(remote_key, version, "entity updated");
        self.stats.write().merged += 1;
        let reply = EntityPayload::from_entity(&client_key, sent_key, version, &entity)?;
        Ok(SyncEntityResult::updated(version, reply))
    }

    /// Deletes the entity and sync record of a remote key.
    ///
    /// The target entity is deleted first, then the record. Both steps
    /// tolerate already-missing data, so a call that failed half way is
    /// completed by repeating it.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MissingKey`] if `remote_key` is empty
    /// - codec errors if the key cannot be decoded or lies in the record
    ///   keyspace
    /// - [`SyncError::NotAllowed`] if the record belongs to someone else
    /// - [`SyncError::DeletePartialFailure`] if either write fails
    pub fn sync_deleted_entity(
        &self,
        remote_key: &str,
        principal: Option<&Principal>,
    ) -> SyncResult<SyncDeletedResult> {
        if remote_key.is_empty() {
            warn!("syncDeletedEntity without remote key");
            return Err(SyncError::MissingKey);
        }
        let client_key = Key::from_remote(remote_key, &self.config.app_id)?;
        reject_reserved(&client_key)?;
        let remote_key = client_key.to_remote();
        let remote_key = remote_key.as_str();

        let _guard = self.locks.lock(remote_key);

        let Some(record) = self.records.get_by_remote_key(remote_key)? else {
            debug!(remote_key, "no sync record, nothing to delete");
            self.stats.write().not_found += 1;
            return Ok(SyncDeletedResult::not_found());
        };

        self.check_owner(&record, principal)?;

        let partial = |stage: DeleteStage, reason: String| {
            warn!(remote_key, %stage, %reason, "delete partially failed");
            SyncError::DeletePartialFailure {
                remote_key: remote_key.to_string(),
                stage,
                reason,
            }
        };

        self.store
            .delete(record.target_key())
            .map_err(|e| partial(DeleteStage::Target, e.to_string()))?;
        self.records
            .delete(&record)
            .map_err(|e| partial(DeleteStage::Record, e.to_string()))?;

        info!(remote_key, version = record.version(), "entity deleted");
        self.stats.write().deleted += 1;
        Ok(SyncDeletedResult::deleted())
    }

    /// Resolves the server-side parent of a client key.
    ///
    /// Fully named parent chains map to themselves; parents with
    /// client-local ids resolve through their own sync record.
    pub fn resolve_parent(&self, key: &Key) -> SyncResult<ParentResolution> {
        resolve_parent(key, |parent| self.records.target_key_for(parent))
    }

    fn store_new(
        &self,
        payload: &EntityPayload,
        sent_key: &str,
        client_key: &Key,
        declared: u64,
        content_hash: &str,
        principal: Option<&Principal>,
    ) -> SyncResult<SyncEntityResult> {
        let remote_key = client_key.to_remote();
        let terminal = match client_key.name() {
            Some(name) => PathElement::new(client_key.kind(), name),
            None => PathElement::incomplete(client_key.kind()),
        };
        let target = match self.resolve_parent(client_key)? {
            ParentResolution::Root => Key::root(
                self.config.app_id.as_str(),
                client_key.namespace().map(str::to_string),
                terminal,
            )?,
            ParentResolution::Resolved(parent) => parent.child(terminal)?,
            ParentResolution::Unresolved => {
                warn!(remote_key = %remote_key, "parent not synced yet");
                return Err(SyncError::UnresolvedParent { remote_key });
            }
        };

        let properties = self.decode_properties(payload)?;
        let target_key = self.store.put(Entity::with_properties(target, properties))?;
        let record = self.records.create(
            &remote_key,
            declared + 1,
            content_hash,
            target_key,
            principal.cloned(),
        )?;

        info!(
            remote_key = %remote_key,
            version = record.version(),
            target = %record.target_key(),
            "entity stored"
        );
        self.stats.write().stored += 1;
        Ok(SyncEntityResult::stored(record.version(), sent_key))
    }

    fn decode_properties(&self, payload: &EntityPayload) -> SyncResult<Properties> {
        let properties = payload.decode_properties(&self.codec)?;
        if let Some(name) = properties
            .iter()
            .find_map(|(name, value)| holds_reserved_key(value).then_some(name))
        {
            warn!(property = %name, "property references the record keyspace");
            return Err(CodecError::malformed_value(
                "key",
                format!("property {name:?} references reserved kind {SYNC_INFO_KIND}"),
            )
            .into());
        }
        Ok(properties)
    }

    fn check_owner(&self, record: &SyncRecord, principal: Option<&Principal>) -> SyncResult<()> {
        if record.is_owned_by(principal) {
            return Ok(());
        }
        warn!(
            remote_key = record.remote_key(),
            principal = principal.map(Principal::email),
            "principal does not own record"
        );
        Err(SyncError::NotAllowed {
            remote_key: record.remote_key().to_string(),
        })
    }

    fn load_target(&self, record: &SyncRecord) -> SyncResult<Entity> {
        self.store
            .get(record.target_key())?
            .ok_or_else(|| SyncError::MissingTarget {
                remote_key: record.remote_key().to_string(),
            })
    }
}

fn reject_reserved(key: &Key) -> SyncResult<()> {
    if is_reserved_key(key) {
        warn!(key = %key, "client key in the record keyspace");
        return Err(CodecError::malformed_key(format!("kind {SYNC_INFO_KIND} is reserved")).into());
    }
    Ok(())
}
