//! In-memory entity store.

use crate::error::StorageResult;
use crate::store::EntityStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use synkit_codec::{Entity, Key};

/// First id handed out by a fresh store.
const FIRST_ID: u64 = 1;

#[derive(Debug)]
struct Inner {
    entities: BTreeMap<Key, Entity>,
    next_id: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: FIRST_ID,
        }
    }
}

/// An in-memory entity store.
///
/// This store keeps all entities in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral servers that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use synkit_codec::{Entity, Key, PathElement};
/// use synkit_storage::{EntityStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// let key = Key::root("test", None, PathElement::incomplete("Book")).unwrap();
/// let stored = store.put(Entity::new(key)).unwrap();
/// assert_eq!(stored.id(), Some(1));
/// assert!(store.get(&stored).unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with entities.
    ///
    /// Entities with incomplete keys get ids allocated as by [`EntityStore::put`].
    ///
    /// # Errors
    ///
    /// Returns an error if an allocated id cannot be applied to a key.
    pub fn with_entities(
        entities: impl IntoIterator<Item = Entity>,
        next_id: u64,
    ) -> StorageResult<Self> {
        let store = Self {
            inner: RwLock::new(Inner {
                entities: BTreeMap::new(),
                next_id: next_id.max(FIRST_ID),
            }),
        };
        {
            let mut inner = store.inner.write();
            for entity in entities {
                inner.insert(entity)?;
            }
        }
        Ok(store)
    }

    /// Returns a copy of every stored entity, ordered by key.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.inner.read().entities.values().cloned().collect()
    }

    /// Returns the id the next allocation will use.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.inner.read().next_id
    }

    /// Removes every entity. Id allocation is not reset.
    pub fn clear(&self) {
        self.inner.write().entities.clear();
    }
}

impl Inner {
    fn insert(&mut self, entity: Entity) -> StorageResult<Key> {
        let entity = match entity.key().id() {
            Some(id) => {
                self.next_id = self.next_id.max(id.saturating_add(1));
                entity
            }
            None if entity.key().is_complete() => entity,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                let key = entity.key().with_id(id)?;
                entity.with_key(key)
            }
        };
        let key = entity.key().clone();
        self.entities.insert(key.clone(), entity);
        Ok(key)
    }
}

impl EntityStore for InMemoryStore {
    fn get(&self, key: &Key) -> StorageResult<Option<Entity>> {
        Ok(self.inner.read().entities.get(key).cloned())
    }

    fn put(&self, entity: Entity) -> StorageResult<Key> {
        self.inner.write().insert(entity)
    }

    fn delete(&self, key: &Key) -> StorageResult<bool> {
        Ok(self.inner.write().entities.remove(key).is_some())
    }

    fn scan_kind(&self, namespace: Option<&str>, kind: &str) -> StorageResult<Vec<Entity>> {
        Ok(self
            .inner
            .read()
            .entities
            .values()
            .filter(|e| e.kind() == kind && e.key().namespace() == namespace)
            .cloned()
            .collect())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.inner.read().entities.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synkit_codec::{PathElement, Value};

    fn incomplete(kind: &str) -> Entity {
        Entity::new(Key::root("test", None, PathElement::incomplete(kind)).unwrap())
    }

    fn named(kind: &str, name: &str) -> Entity {
        Entity::new(Key::root("test", None, PathElement::new(kind, name)).unwrap())
    }

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.next_id(), 1);
    }

    #[test]
    fn memory_put_allocates_ids() {
        let store = InMemoryStore::new();
        let first = store.put(incomplete("Book")).unwrap();
        let second = store.put(incomplete("Book")).unwrap();

        assert_eq!(first.id(), Some(1));
        assert_eq!(second.id(), Some(2));
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn memory_explicit_id_advances_allocator() {
        let store = InMemoryStore::new();
        let key = Key::root("test", None, PathElement::new("Book", 10u64)).unwrap();
        store.put(Entity::new(key)).unwrap();

        let allocated = store.put(incomplete("Book")).unwrap();
        assert_eq!(allocated.id(), Some(11));
    }

    #[test]
    fn memory_put_overwrites() {
        let store = InMemoryStore::new();
        let mut entity = named("Book", "catcher");
        let key = store.put(entity.clone()).unwrap();

        entity.set("title", "The Catcher in the Rye");
        store.put(entity).unwrap();

        let stored = store.get(&key).unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&Value::from("The Catcher in the Rye")));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn memory_delete_missing_is_ok() {
        let store = InMemoryStore::new();
        let key = store.put(named("Book", "catcher")).unwrap();

        assert!(store.delete(&key).unwrap());
        assert!(!store.delete(&key).unwrap());
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn memory_scan_kind_filters() {
        let store = InMemoryStore::new();
        store.put(named("Book", "a")).unwrap();
        store.put(named("Book", "b")).unwrap();
        store.put(named("Author", "c")).unwrap();
        let ns_key = Key::root("test", Some("shelf".into()), PathElement::new("Book", "d")).unwrap();
        store.put(Entity::new(ns_key)).unwrap();

        let books = store.scan_kind(None, "Book").unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(store.scan_kind(Some("shelf"), "Book").unwrap().len(), 1);
        assert!(store.scan_kind(None, "Chapter").unwrap().is_empty());
    }

    #[test]
    fn memory_clear_keeps_allocator() {
        let store = InMemoryStore::new();
        store.put(incomplete("Book")).unwrap();
        store.clear();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.put(incomplete("Book")).unwrap().id(), Some(2));
    }

    #[test]
    fn memory_with_entities() {
        let store = InMemoryStore::with_entities(vec![named("Book", "a"), incomplete("Book")], 5)
            .unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.next_id(), 6);
    }
}
