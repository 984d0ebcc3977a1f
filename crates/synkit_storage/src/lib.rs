//! # Synkit Storage
//!
//! Entity store trait and implementations for Synkit.
//!
//! This crate provides the datastore the sync engine writes to. Stores
//! map complete [`Key`](synkit_codec::Key)s to
//! [`Entity`](synkit_codec::Entity) values and allocate numeric ids for
//! entities stored under incomplete keys.
//!
//! ## Design Principles
//!
//! - Stores know nothing about sync records or versions
//! - Every call is atomic on its own; there are no transactions
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral servers
//! - [`FileStore`] - JSON snapshot on disk
//!
//! ## Example
//!
//! ```rust
//! use synkit_codec::{Entity, Key, PathElement};
//! use synkit_storage::{EntityStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! let key = Key::root("test", None, PathElement::new("Book", "catcher")).unwrap();
//! store.put(Entity::new(key.clone())).unwrap();
//! assert!(store.get(&key).unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::EntityStore;
