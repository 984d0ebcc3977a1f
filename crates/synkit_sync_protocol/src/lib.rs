//! # Synkit Sync Protocol
//!
//! Wire types for the Synkit sync protocol.
//!
//! This crate provides:
//! - `EntityPayload` and `ClientVersion` for entities sent by clients
//! - `SyncStatus` codes and the `syncEntity`/`syncDeletedEntity` results
//! - `ContentHash` for cheap change detection
//! - The JSON-RPC 2.0 envelope
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod hash;
pub mod jsonrpc;
mod payload;
mod result;
mod status;

pub use hash::ContentHash;
pub use jsonrpc::{ErrorObject, Request, RequestId, Response, ResponseBody};
pub use payload::{ClientVersion, EntityPayload, MAX_DECLARED_VERSION};
pub use result::{SyncDeletedResult, SyncEntityResult};
pub use status::SyncStatus;

/// Method name of the entity sync call.
pub const METHOD_SYNC_ENTITY: &str = "syncEntity";

/// Method name of the deletion sync call.
pub const METHOD_SYNC_DELETED_ENTITY: &str = "syncDeletedEntity";

/// Method name of the connectivity check.
pub const METHOD_TEST: &str = "test";
