//! # Synkit Codec
//!
//! Key and property codecs for the Synkit sync protocol.
//!
//! This crate provides:
//! - Structured entity keys and their opaque remote (base64) form
//! - The closed registry of wire type tags
//! - Conversion between `{type, value}` wire properties and native values
//! - Entities with field-level merge
//!
//! ## Remote keys
//!
//! A remote key is the standard base64 encoding of
//!
//! ```text
//! <app-id>@<namespace or "default">!!<Kind>\n<id>\t<Kind>\b<name>...
//! ```
//!
//! Decoding checks the embedded application id before looking at the path.
//!
//! ## Usage
//!
//! ```
//! use synkit_codec::{Key, PathElement};
//!
//! let author = Key::root("test", None, PathElement::new("Author", "salinger")).unwrap();
//! let book = author.child(PathElement::new("Book", 42u64)).unwrap();
//!
//! let remote = book.to_remote();
//! assert_eq!(remote, "dGVzdEBkZWZhdWx0ISFBdXRob3IIc2FsaW5nZXIJQm9vawo0Mg==");
//! assert_eq!(Key::from_remote(&remote, "test").unwrap(), book);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod key;
mod value;
mod wire;

pub use entity::Entity;
pub use error::{CodecError, CodecResult};
pub use key::{
    resolve_parent, IdOrName, Key, ParentResolution, PathElement, DEFAULT_NAMESPACE,
};
pub use value::{GeoPt, Principal, TypeTag, Value, MAX_RATING, TIMESTAMP_FORMAT};
pub use wire::{
    encode_value, format_timestamp, parse_timestamp, Properties, PropertyCodec, WireProperties,
    WireProperty,
};
