//! Sync engine properties over generated request sequences.

use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use synkit_codec::ParentResolution;
use synkit_sync_engine::SyncError;
use synkit_sync_protocol::{ContentHash, SyncStatus};
use synkit_testkit::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    /// A single well-behaved client replaying a script: versions only grow
    /// while the entity exists, unchanged content never bumps the version,
    /// and the server copy always equals what the client last merged.
    #[test]
    fn client_script(script in sync_script_strategy(1, 40)) {
        let test_engine = TestEngine::memory();
        let engine = &test_engine.engine;
        let key = book_key("script");

        let mut version = 0u64;
        let mut fields: BTreeMap<String, i64> = BTreeMap::new();

        for step in script {
            let mut request = payload(&key, version);
            for (name, value) in &fields {
                request = request.with_property(name.as_str(), wire("int", json!(value)));
            }

            match step {
                SyncStep::Sync { property, value } => {
                    fields.insert(property.clone(), value);
                    let request = request.with_property(property, wire("int", json!(value)));
                    let result = sync(engine, &request).unwrap();
                    let expected = version + 1;
                    match result.status {
                        SyncStatus::Stored | SyncStatus::Updated => {
                            prop_assert_eq!(result.version, Some(expected));
                        }
                        SyncStatus::NotChanged => {
                            prop_assert_eq!(result.version, Some(version));
                        }
                        other => prop_assert!(false, "unexpected {:?}", other),
                    }
                    version = result.version.unwrap();
                }
                SyncStep::Resend => {
                    if version == 0 {
                        continue;
                    }
                    let result = sync(engine, &request).unwrap();
                    prop_assert_eq!(result.status, SyncStatus::NotChanged);
                    prop_assert_eq!(result.version, Some(version));
                }
                SyncStep::Stale => {
                    if version < 2 {
                        continue;
                    }
                    let stale = payload(&key, version - 1)
                        .with_property("stale", wire("bool", json!(true)));
                    let result = sync(engine, &stale).unwrap();
                    prop_assert_eq!(result.status, SyncStatus::Updated);
                    prop_assert_eq!(result.version, Some(version));
                    prop_assert!(!result.entity.unwrap().properties.contains_key("stale"));
                }
                SyncStep::Delete => {
                    let result = delete(engine, &key).unwrap();
                    let expected = if version == 0 { SyncStatus::NotFound } else { SyncStatus::Deleted };
                    prop_assert_eq!(result.status, expected);
                    version = 0;
                    fields.clear();
                }
            }

            let record = engine.records().get_by_remote_key(&key.to_remote()).unwrap();
            prop_assert_eq!(record.as_ref().map(|r| r.version()).unwrap_or(0), version);
        }
    }

    /// Declaring a version the server never issued is always rejected and
    /// leaves the record untouched.
    #[test]
    fn versions_ahead_are_rejected(ahead in 1u64..50) {
        with_engine(|engine| {
            let first = book("ahead", 0, "first");
            sync(engine, &first).unwrap();

            let request = book("ahead", 1 + ahead, "second");
            let err = sync(engine, &request).unwrap_err();
            let is_expected_conflict = matches!(err, SyncError::VersionConflict { client, stored: 1, .. } if client == 1 + ahead);
            prop_assert!(is_expected_conflict);

            let record = engine.records().require(&book_key("ahead").to_remote()).unwrap();
            prop_assert_eq!(record.version(), 1);
            let expected_hash = ContentHash::compute(&first);
            prop_assert_eq!(record.content_hash(), expected_hash.as_str());
            Ok(())
        })?;
    }

    /// Keys with fully named paths store under the same path server-side.
    #[test]
    fn named_keys_store_in_place(key in named_key_strategy(TEST_APP_ID, 3)) {
        with_engine(|engine| {
            let result = sync(engine, &payload(&key, 0)).unwrap();
            prop_assert_eq!(result.status, SyncStatus::Stored);

            let record = engine.records().require(&key.to_remote()).unwrap();
            prop_assert_eq!(record.target_key(), &key);
            Ok(())
        })?;
    }
}

#[test]
fn child_resolves_after_parent_sync() {
    with_engine(|engine| {
        let parent = book_key("catcher")
            .child(synkit_codec::PathElement::new("Shelf", 9u64))
            .unwrap();
        let child = parent
            .child(synkit_codec::PathElement::new("Note", "margin"))
            .unwrap();

        assert_eq!(
            engine.resolve_parent(&child).unwrap(),
            ParentResolution::Unresolved
        );
        assert!(matches!(
            sync(engine, &payload(&child, 0)),
            Err(SyncError::UnresolvedParent { .. })
        ));

        sync(engine, &payload(&parent, 0)).unwrap();
        let first = engine.resolve_parent(&child).unwrap();
        let again = engine.resolve_parent(&child).unwrap();
        assert_eq!(first, again);

        let server_parent = first.key().cloned().unwrap();
        let parent_record = engine.records().require(&parent.to_remote()).unwrap();
        assert_eq!(parent_record.target_key(), &server_parent);

        sync(engine, &payload(&child, 0)).unwrap();
        let stored = engine.records().require(&child.to_remote()).unwrap();
        assert_eq!(stored.target_key().parent(), Some(server_parent));
    });
}

#[test]
fn stress_from_several_threads() {
    let engine = shared_memory_engine();
    let config = StressConfig {
        operations: 400,
        threads: 8,
        entity_count: 5,
    };
    let result = stress_concurrent_syncs(std::sync::Arc::clone(&engine), &config);
    assert_eq!(result.failed_ops, 0);
    for record in engine.records().list().unwrap() {
        assert!(record.version() >= 1);
    }
}

#[test]
fn file_engine_keeps_versions_across_restart() {
    with_file_engine(|test_engine| {
        sync(&test_engine.engine, &book("catcher", 0, "one")).unwrap();
        sync(&test_engine.engine, &book("catcher", 1, "two")).unwrap();

        let reopened = test_engine.reopen();
        let result = sync(&reopened, &book("catcher", 2, "two")).unwrap();
        assert_eq!(result.status, SyncStatus::NotChanged);
        assert_eq!(result.version, Some(2));
    });
}
