//! Integration tests for the sync engine over real entity stores.

use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use synkit_codec::{
    encode_value, Entity, Key, ParentResolution, PathElement, Principal, Value, WireProperty,
};
use synkit_storage::{EntityStore, InMemoryStore, StorageError, StorageResult};
use synkit_sync_engine::{
    record_name, DeleteStage, EngineConfig, SyncEngine, SyncError, SYNC_INFO_KIND,
};
use synkit_sync_protocol::{ContentHash, EntityPayload, SyncStatus, MAX_DECLARED_VERSION};

/// A store whose deletes fail for one kind until healed.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    fail_delete_kind: RwLock<Option<String>>,
}

impl FlakyStore {
    fn fail_deletes_of(&self, kind: &str) {
        *self.fail_delete_kind.write() = Some(kind.to_string());
    }

    fn heal(&self) {
        *self.fail_delete_kind.write() = None;
    }
}

impl EntityStore for FlakyStore {
    fn get(&self, key: &Key) -> StorageResult<Option<Entity>> {
        self.inner.get(key)
    }

    fn put(&self, entity: Entity) -> StorageResult<Key> {
        self.inner.put(entity)
    }

    fn delete(&self, key: &Key) -> StorageResult<bool> {
        if self.fail_delete_kind.read().as_deref() == Some(key.kind()) {
            return Err(StorageError::unavailable("injected delete failure"));
        }
        self.inner.delete(key)
    }

    fn scan_kind(&self, namespace: Option<&str>, kind: &str) -> StorageResult<Vec<Entity>> {
        self.inner.scan_kind(namespace, kind)
    }

    fn len(&self) -> StorageResult<usize> {
        self.inner.len()
    }
}

fn engine() -> SyncEngine<InMemoryStore> {
    SyncEngine::new(EngineConfig::new("test"), InMemoryStore::new())
}

fn named(kind: &str, name: &str) -> Key {
    Key::root("test", None, PathElement::new(kind, name)).unwrap()
}

fn string(value: &str) -> WireProperty {
    WireProperty::new("string", json!(value))
}

fn payload(key: &Key, version: u64) -> EntityPayload {
    EntityPayload::new(key.kind(), key.to_remote()).with_version(version)
}

fn target_of<S: EntityStore>(engine: &SyncEngine<S>, key: &Key) -> Entity {
    let record = engine.records().require(&key.to_remote()).unwrap();
    engine.store().get(record.target_key()).unwrap().unwrap()
}

#[test]
fn stored_not_changed_updated_sequence() {
    let engine = engine();
    let key = named("Book", "catcher");
    let remote = key.to_remote();

    let first = payload(&key, 0).with_property("title", string("T"));
    let result = engine.sync_entity(&first, "H1", None).unwrap();
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"status": 3, "version": 1, "key": remote})
    );

    let result = engine.sync_entity(&first, "H1", None).unwrap();
    assert_eq!(result.status, SyncStatus::NotChanged);
    assert_eq!(result.version, Some(1));

    let second = payload(&key, 1).with_property("title", string("T2"));
    let result = engine.sync_entity(&second, "H2", None).unwrap();
    assert_eq!(result.status, SyncStatus::Updated);
    assert_eq!(result.version, Some(2));
    let entity = result.entity.unwrap();
    assert_eq!(entity.properties["title"], string("T2"));
    assert_eq!(entity.key.as_deref(), Some(remote.as_str()));

    let record = engine.records().require(&remote).unwrap();
    assert_eq!(record.version(), 2);
    assert_eq!(record.content_hash(), "H2");
}

#[test]
fn merge_preserves_omitted_properties() {
    let engine = engine();
    let key = named("Book", "catcher");

    let full = payload(&key, 0)
        .with_property("title", string("The Catcher in the Rye"))
        .with_property("year", WireProperty::new("int", json!(1951)));
    engine.sync_entity(&full, "H1", None).unwrap();

    let partial = payload(&key, 1).with_property("title", string("Catcher"));
    let result = engine.sync_entity(&partial, "H2", None).unwrap();
    let entity = result.entity.unwrap();
    assert_eq!(entity.properties["title"], string("Catcher"));
    assert_eq!(entity.properties["year"], WireProperty::new("int", json!(1951)));

    let stored = target_of(&engine, &key);
    assert_eq!(stored.get("year"), Some(&Value::Int(1951)));
    assert_eq!(stored.get("title"), Some(&Value::from("Catcher")));
}

#[test]
fn stale_client_receives_server_entity() {
    let engine = engine();
    let key = named("Book", "catcher");

    engine
        .sync_entity(&payload(&key, 0).with_property("title", string("T")), "H1", None)
        .unwrap();
    engine
        .sync_entity(&payload(&key, 1).with_property("title", string("T2")), "H2", None)
        .unwrap();

    let stale = payload(&key, 1).with_property("title", string("mine"));
    let result = engine.sync_entity(&stale, "H3", None).unwrap();
    assert_eq!(result.status, SyncStatus::Updated);
    assert_eq!(result.version, Some(2));
    assert_eq!(result.entity.unwrap().properties["title"], string("T2"));

    let record = engine.records().require(&key.to_remote()).unwrap();
    assert_eq!(record.version(), 2);
    assert_eq!(record.content_hash(), "H2");
    assert_eq!(engine.stats().stale, 1);
}

#[test]
fn version_ahead_is_rejected_without_mutation() {
    let engine = engine();
    let key = named("Book", "catcher");
    engine
        .sync_entity(&payload(&key, 0).with_property("title", string("T")), "H1", None)
        .unwrap();

    let err = engine
        .sync_entity(&payload(&key, 2).with_property("title", string("X")), "H9", None)
        .unwrap_err();
    assert_eq!(err.kind(), "VersionConflict");
    assert_eq!(target_of(&engine, &key).get("title"), Some(&Value::from("T")));
}

#[test]
fn first_sync_with_nonzero_version_uses_successor() {
    let engine = engine();
    let key = named("Book", "catcher");
    let result = engine.sync_entity(&payload(&key, 4), "H1", None).unwrap();
    assert_eq!(result.status, SyncStatus::Stored);
    assert_eq!(result.version, Some(5));
}

#[test]
fn numeric_ids_are_allocated_by_server() {
    let engine = engine();
    let client_key = Key::root("test", None, PathElement::new("Note", 7u64)).unwrap();
    engine.sync_entity(&payload(&client_key, 0), "H1", None).unwrap();

    let record = engine.records().require(&client_key.to_remote()).unwrap();
    assert_eq!(record.target_key().kind(), "Note");
    assert!(record.target_key().id().is_some());
}

#[test]
fn incomplete_terminal_is_accepted() {
    let engine = engine();
    let client_key = Key::root("test", None, PathElement::incomplete("Note")).unwrap();
    let result = engine.sync_entity(&payload(&client_key, 0), "H1", None).unwrap();
    assert_eq!(result.status, SyncStatus::Stored);
}

#[test]
fn child_waits_for_numeric_parent() {
    let engine = engine();
    let author = Key::root("test", None, PathElement::new("Author", 5u64)).unwrap();
    let book = author.child(PathElement::new("Book", 1u64)).unwrap();

    let err = engine.sync_entity(&payload(&book, 0), "HB", None).unwrap_err();
    assert!(matches!(err, SyncError::UnresolvedParent { .. }));
    assert!(err.is_retryable());
    assert_eq!(engine.resolve_parent(&book).unwrap(), ParentResolution::Unresolved);

    engine.sync_entity(&payload(&author, 0), "HA", None).unwrap();
    let server_author = engine
        .records()
        .require(&author.to_remote())
        .unwrap()
        .target_key()
        .clone();

    let result = engine.sync_entity(&payload(&book, 0), "HB", None).unwrap();
    assert_eq!(result.status, SyncStatus::Stored);

    let stored_book = engine.records().require(&book.to_remote()).unwrap();
    assert_eq!(stored_book.target_key().parent(), Some(server_author.clone()));

    let first = engine.resolve_parent(&book).unwrap();
    let second = engine.resolve_parent(&book).unwrap();
    assert_eq!(first, ParentResolution::Resolved(server_author));
    assert_eq!(first, second);
}

#[test]
fn named_parent_resolves_without_sync() {
    let engine = engine();
    let author = named("Author", "salinger");
    let book = author.child(PathElement::new("Book", "catcher")).unwrap();

    let result = engine.sync_entity(&payload(&book, 0), "H1", None).unwrap();
    assert_eq!(result.status, SyncStatus::Stored);
    let record = engine.records().require(&book.to_remote()).unwrap();
    assert_eq!(record.target_key(), &book);
}

#[test]
fn delete_removes_entity_and_record() {
    let engine = engine();
    let key = named("Book", "catcher");
    engine.sync_entity(&payload(&key, 0), "H1", None).unwrap();
    let target = engine.records().require(&key.to_remote()).unwrap().target_key().clone();

    let result = engine.sync_deleted_entity(&key.to_remote(), None).unwrap();
    assert_eq!(result.status, SyncStatus::Deleted);
    assert!(engine.store().get(&target).unwrap().is_none());
    assert!(engine.records().get_by_remote_key(&key.to_remote()).unwrap().is_none());

    let again = engine.sync_deleted_entity(&key.to_remote(), None).unwrap();
    assert_eq!(again.status, SyncStatus::NotFound);

    let result = engine.sync_entity(&payload(&key, 0), "H1", None).unwrap();
    assert_eq!(result.status, SyncStatus::Stored);
    assert_eq!(result.version, Some(1));
}

#[test]
fn delete_resumes_after_record_failure() {
    let engine = SyncEngine::new(EngineConfig::new("test"), FlakyStore::default());
    let key = named("Book", "catcher");
    let remote = key.to_remote();
    engine.sync_entity(&payload(&key, 0), "H1", None).unwrap();

    engine.store().fail_deletes_of(SYNC_INFO_KIND);
    let err = engine.sync_deleted_entity(&remote, None).unwrap_err();
    assert!(matches!(
        err,
        SyncError::DeletePartialFailure {
            stage: DeleteStage::Record,
            ..
        }
    ));
    assert!(engine.store().get(&key).unwrap().is_none());
    assert!(engine.records().get_by_remote_key(&remote).unwrap().is_some());

    engine.store().heal();
    let result = engine.sync_deleted_entity(&remote, None).unwrap();
    assert_eq!(result.status, SyncStatus::Deleted);
    assert!(engine.records().get_by_remote_key(&remote).unwrap().is_none());
}

#[test]
fn delete_reports_target_failure() {
    let engine = SyncEngine::new(EngineConfig::new("test"), FlakyStore::default());
    let key = named("Book", "catcher");
    engine.sync_entity(&payload(&key, 0), "H1", None).unwrap();

    engine.store().fail_deletes_of("Book");
    let err = engine.sync_deleted_entity(&key.to_remote(), None).unwrap_err();
    assert!(matches!(
        err,
        SyncError::DeletePartialFailure {
            stage: DeleteStage::Target,
            ..
        }
    ));
    assert!(engine.records().get_by_remote_key(&key.to_remote()).unwrap().is_some());

    engine.store().heal();
    assert_eq!(
        engine.sync_deleted_entity(&key.to_remote(), None).unwrap().status,
        SyncStatus::Deleted
    );
}

#[test]
fn owner_is_recorded_and_enforced() {
    let engine = engine();
    let key = named("Book", "catcher");
    let owner = Principal::new("jd@example.com");

    engine.sync_entity(&payload(&key, 0), "H1", Some(&owner)).unwrap();
    let record = engine.records().require(&key.to_remote()).unwrap();
    assert_eq!(record.owner(), Some(&owner));

    let err = engine.sync_entity(&payload(&key, 1), "H2", None).unwrap_err();
    assert_eq!(err.kind(), "NotAllowed");
    assert!(engine.sync_entity(&payload(&key, 1), "H2", Some(&owner)).is_ok());
}

#[test]
fn codec_errors_surface() {
    let engine = engine();
    let key = named("Book", "catcher");

    let bad_type = payload(&key, 0).with_property("price", WireProperty::new("decimal", json!("1")));
    assert_eq!(
        engine.sync_entity(&bad_type, "H", None).unwrap_err().kind(),
        "UnsupportedType"
    );

    let bad_value = payload(&key, 0).with_property("year", WireProperty::new("int", json!("x")));
    assert_eq!(
        engine.sync_entity(&bad_value, "H", None).unwrap_err().kind(),
        "MalformedValue"
    );

    let foreign = EntityPayload::new("Book", "b3RoZXJAZGVmYXVsdCEhQm9vawhjYXRjaGVy");
    assert_eq!(
        engine.sync_entity(&foreign, "H", None).unwrap_err().kind(),
        "AccessDenied"
    );

    let garbage = EntityPayload::new("Book", "not a key");
    assert_eq!(
        engine.sync_entity(&garbage, "H", None).unwrap_err().kind(),
        "MalformedKey"
    );
    assert!(engine.store().is_empty().unwrap());
}

#[test]
fn computed_hashes_drive_change_detection() {
    let engine = engine();
    let key = named("Book", "catcher");

    let first = payload(&key, 0).with_property("title", string("T"));
    let hash = ContentHash::compute(&first);
    engine.sync_entity(&first, hash.as_str(), None).unwrap();

    let same = payload(&key, 1).with_property("title", string("T"));
    let result = engine
        .sync_entity(&same, ContentHash::compute(&same).as_str(), None)
        .unwrap();
    assert_eq!(result.status, SyncStatus::NotChanged);
}

#[test]
fn concurrent_first_syncs_store_once() {
    let engine = Arc::new(engine());
    let key = named("Book", "catcher");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let key = key.clone();
            thread::spawn(move || {
                let p = payload(&key, 0).with_property("title", string(&format!("T{i}")));
                engine.sync_entity(&p, &format!("H{i}"), None).unwrap().status
            })
        })
        .collect();

    let statuses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let stored = statuses.iter().filter(|s| **s == SyncStatus::Stored).count();
    assert_eq!(stored, 1);
    assert!(statuses
        .iter()
        .all(|s| matches!(s, SyncStatus::Stored | SyncStatus::Updated)));
    assert_eq!(engine.records().require(&key.to_remote()).unwrap().version(), 1);
}

#[test]
fn concurrent_merges_serialize_versions() {
    let engine = Arc::new(engine());
    let key = named("Counter", "c");
    engine.sync_entity(&payload(&key, 0), "H0", None).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let key = key.clone();
            thread::spawn(move || {
                let mut merged = 0;
                let name = format!("t{t}");
                for i in 0..25 {
                    let version = engine.records().require(&key.to_remote()).unwrap().version();
                    let mine = WireProperty::new("int", json!(i));
                    let p = payload(&key, version).with_property(name.clone(), mine.clone());
                    let result = engine.sync_entity(&p, &format!("H{t}-{i}"), None).unwrap();
                    let reply = result.entity.unwrap();
                    if reply.properties.get(&name) == Some(&mine) {
                        merged += 1;
                    }
                }
                merged
            })
        })
        .collect();

    let merged: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let record = engine.records().require(&key.to_remote()).unwrap();
    assert_eq!(record.version(), 1 + merged);
    assert_eq!(engine.stats().merged, merged);
}

#[test]
fn different_keys_are_independent() {
    let engine = Arc::new(engine());
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let key = named("Book", &format!("b{i}"));
                engine.sync_entity(&payload(&key, 0), "H", None).unwrap().status
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), SyncStatus::Stored);
    }
    assert_eq!(engine.records().list().unwrap().len(), 16);
}

#[test]
fn record_keyspace_is_closed_to_clients() {
    let engine = engine();
    let victim = Principal::new("victim@example.com");
    let attacker = Principal::new("attacker@example.com");
    let key = named("Book", "catcher");
    let remote = key.to_remote();

    engine.sync_entity(&payload(&key, 0), "H1", Some(&victim)).unwrap();
    let target = engine.records().require(&remote).unwrap().target_key().clone();

    let record_key = named(SYNC_INFO_KIND, &record_name(&remote));
    let forged = payload(&record_key, 0)
        .with_property("remote_key", string(&remote))
        .with_property("owner", encode_value(&Value::User(attacker.clone())).unwrap())
        .with_property("target_key", encode_value(&Value::Key(target)).unwrap());
    let err = engine.sync_entity(&forged, "H", Some(&attacker)).unwrap_err();
    assert_eq!(err.kind(), "MalformedKey");

    let below = record_key.child(PathElement::new("Book", "x")).unwrap();
    let err = engine.sync_entity(&payload(&below, 0), "H", Some(&attacker)).unwrap_err();
    assert_eq!(err.kind(), "MalformedKey");

    let pointer = payload(&named("Book", "pointer"), 0)
        .with_property("ref", encode_value(&Value::Key(record_key.clone())).unwrap());
    let err = engine.sync_entity(&pointer, "H", Some(&attacker)).unwrap_err();
    assert_eq!(err.kind(), "MalformedValue");

    let err = engine
        .sync_deleted_entity(&record_key.to_remote(), Some(&attacker))
        .unwrap_err();
    assert_eq!(err.kind(), "MalformedKey");

    let record = engine.records().require(&remote).unwrap();
    assert_eq!(record.owner(), Some(&victim));
    assert_eq!(engine.records().list().unwrap().len(), 1);
    assert_eq!(
        engine.sync_deleted_entity(&remote, Some(&attacker)).unwrap_err().kind(),
        "NotAllowed"
    );
    assert_eq!(
        engine.sync_deleted_entity(&remote, Some(&victim)).unwrap().status,
        SyncStatus::Deleted
    );
}

#[test]
fn equivalent_key_strings_share_one_record() {
    let engine = engine();
    let key = named("Book", "catcher");
    let remote = key.to_remote();
    let alias = format!("{remote}\n");

    engine
        .sync_entity(&payload(&key, 0).with_property("title", string("T")), "H1", None)
        .unwrap();

    let second = EntityPayload::new("Book", alias.as_str())
        .with_version(1)
        .with_property("title", string("T2"));
    let result = engine.sync_entity(&second, "H2", None).unwrap();
    assert_eq!(result.status, SyncStatus::Updated);
    assert_eq!(result.version, Some(2));
    assert_eq!(result.entity.unwrap().key.as_deref(), Some(alias.as_str()));

    let again = engine.sync_entity(&second, "H2", None).unwrap();
    assert_eq!(again.status, SyncStatus::NotChanged);
    assert_eq!(again.key.as_deref(), Some(alias.as_str()));

    let records = engine.records().list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].remote_key(), remote);

    assert_eq!(
        engine.sync_deleted_entity(&format!(" {remote}"), None).unwrap().status,
        SyncStatus::Deleted
    );
    assert!(engine.store().is_empty().unwrap());
}

#[test]
fn oversized_declared_version_is_rejected_before_writing() {
    let engine = engine();
    let key = named("Book", "catcher");

    for _ in 0..2 {
        let err = engine
            .sync_entity(&payload(&key, 1u64 << 63), "H1", None)
            .unwrap_err();
        assert_eq!(err.kind(), "MalformedValue");
        assert!(err.is_client_error());
    }
    assert!(engine.store().is_empty().unwrap());

    let result = engine
        .sync_entity(&payload(&key, MAX_DECLARED_VERSION), "H1", None)
        .unwrap();
    assert_eq!(result.status, SyncStatus::Stored);
    assert_eq!(result.version, Some(i64::MAX as u64));

    let stale = engine
        .sync_entity(&payload(&key, MAX_DECLARED_VERSION), "H2", None)
        .unwrap();
    assert_eq!(stale.status, SyncStatus::Updated);
    assert_eq!(stale.version, Some(i64::MAX as u64));
}
