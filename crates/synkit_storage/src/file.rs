//! File-backed entity store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryStore;
use crate::store::EntityStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use synkit_codec::{Entity, Key, PropertyCodec, WireProperties};

/// On-disk snapshot layout.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    entities: Vec<StoredEntity>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntity {
    key: String,
    properties: WireProperties,
}

impl StoredEntity {
    fn encode(entity: &Entity) -> StorageResult<Self> {
        let codec = PropertyCodec::new(entity.key().app_id());
        Ok(Self {
            key: entity.key().to_remote(),
            properties: codec.encode(entity.properties())?,
        })
    }

    fn decode(self) -> StorageResult<Entity> {
        let key = Key::decode_remote(&self.key)?;
        let codec = PropertyCodec::new(key.app_id());
        let properties = codec.decode(&self.properties)?;
        Ok(Entity::with_properties(key, properties))
    }
}

/// A file-backed entity store.
///
/// Entities live in memory and every mutation rewrites a JSON snapshot of
/// the whole store. The snapshot is written to a temporary sibling file and
/// renamed over the previous one, so a crash leaves either the old or the
/// new snapshot on disk.
///
/// # Thread Safety
///
/// Mutations are serialized so snapshots are written in mutation order.
///
/// # Example
///
/// ```no_run
/// use synkit_storage::{EntityStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("entities.json")).unwrap();
/// println!("{} entities", store.len().unwrap());
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: InMemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`, loading an existing snapshot if present.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing snapshot cannot be read or parsed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let memory = if path.exists() {
            let bytes = fs::read(path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Corrupted(format!("{}: {e}", path.display()))
            })?;
            let entities = snapshot
                .entities
                .into_iter()
                .map(StoredEntity::decode)
                .collect::<StorageResult<Vec<_>>>()?;
            InMemoryStore::with_entities(entities, snapshot.next_id)?
        } else {
            InMemoryStore::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            memory,
            write_lock: Mutex::new(()),
        })
    }

    /// Opens the store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the snapshot
    /// cannot be loaded.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of every stored entity, ordered by key.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.memory.entities()
    }

    fn persist(&self) -> StorageResult<()> {
        let snapshot = Snapshot {
            next_id: self.memory.next_id(),
            entities: self
                .memory
                .entities()
                .iter()
                .map(StoredEntity::encode)
                .collect::<StorageResult<Vec<_>>>()?,
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl EntityStore for FileStore {
    fn get(&self, key: &Key) -> StorageResult<Option<Entity>> {
        self.memory.get(key)
    }

    fn put(&self, entity: Entity) -> StorageResult<Key> {
        let _guard = self.write_lock.lock();
        let key = self.memory.put(entity)?;
        self.persist()?;
        Ok(key)
    }

    fn delete(&self, key: &Key) -> StorageResult<bool> {
        let _guard = self.write_lock.lock();
        let removed = self.memory.delete(key)?;
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    fn scan_kind(&self, namespace: Option<&str>, kind: &str) -> StorageResult<Vec<Entity>> {
        self.memory.scan_kind(namespace, kind)
    }

    fn len(&self) -> StorageResult<usize> {
        self.memory.len()
    }
}
