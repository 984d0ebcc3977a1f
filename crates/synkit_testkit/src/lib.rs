//! # Synkit Testkit
//!
//! Test utilities for Synkit.
//!
//! This crate provides:
//! - Engine fixtures over in-memory and temporary file stores
//! - Payload builders for the requests a client sends
//! - Property-based generators for keys, values and entities
//! - Cross-language vectors for remote keys and tagged values
//! - Fuzz harnesses for the decoders and the engine
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use synkit_sync_protocol::SyncStatus;
//! use synkit_testkit::prelude::*;
//!
//! with_engine(|engine| {
//!     let result = sync(engine, &book("catcher", 0, "The Catcher in the Rye")).unwrap();
//!     assert_eq!(result.status, SyncStatus::Stored);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use stress::*;
pub use vectors::*;
