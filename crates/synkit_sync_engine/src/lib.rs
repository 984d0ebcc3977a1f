//! # Synkit Sync Engine
//!
//! Version-stamped sync engine for Synkit.
//!
//! This crate provides:
//! - Sync records (version, content hash, target key, owner per remote key)
//! - The compare/merge/version-increment state machine
//! - Ancestor resolution for keys with client-local ids
//! - Idempotent, resumable deletion
//!
//! ## State Machine
//!
//! For each `syncEntity` request:
//! 1. No record: store the entity, create a record at `declared + 1`
//! 2. Same content hash: `NotChanged`, nothing is written
//! 3. Client version ahead of the record: `VersionConflict`
//! 4. Client version behind: `Updated` with the server's entity
//! 5. Equal versions: field-level merge, version + 1, `Updated`
//!
//! ## Key Invariants
//!
//! - Only a content change at the current version bumps the version
//! - A remote key always maps to the same record
//! - Requests for one remote key never interleave
//! - The target entity and the record are separate writes; a crash between
//!   them leaves a record pointing at stale or missing content, which the
//!   next request for that key observes

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod engine;
mod error;
mod locks;
mod record;

pub use config::{EngineConfig, DEFAULT_LOCK_STRIPES};
pub use engine::{EngineStats, SyncEngine};
pub use error::{DeleteStage, SyncError, SyncResult};
pub use locks::KeyLocks;
pub use record::{
    holds_reserved_key, is_reserved_key, record_name, SyncRecord, SyncRecordStore, SYNC_INFO_KIND,
};
