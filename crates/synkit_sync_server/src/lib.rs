//! # Synkit Sync Server
//!
//! JSON-RPC front end for the Synkit sync engine.
//!
//! This crate provides:
//! - `RpcDispatcher` mapping `syncEntity`, `syncDeletedEntity` and `test`
//!   onto the engine
//! - A line-delimited JSON-RPC TCP listener (one task per connection)
//! - Principal lookup (`PrincipalProvider`) with static and HMAC-SHA256
//!   token implementations
//! - Stable JSON-RPC error codes for every engine error kind
//!
//! # Protocol
//!
//! Each line a client sends is one request:
//!
//! ```text
//! {"jsonrpc":"2.0","method":"syncEntity","params":[{..entity..},"<hash>"],"id":1}
//! ```
//!
//! and each request with an id gets one response line carrying either
//! `result` or `error {code, message, data: {kind}}`.
//!
//! # Authentication
//!
//! Without an auth secret every connection runs as the configured default
//! principal (or anonymously). With one, clients send
//! `authenticate [token]` first:
//!
//! ```rust,ignore
//! use synkit_sync_server::{AuthConfig, ServerConfig, TokenValidator};
//!
//! let secret = b"my-secure-secret-32-bytes-long!".to_vec();
//! let config = ServerConfig::default().with_auth(secret.clone());
//!
//! let validator = TokenValidator::new(AuthConfig::new(secret));
//! let token = validator.create_token(&Principal::new("jd@example.com"))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod dispatch;
mod error;
mod server;

pub use auth::{AuthConfig, PrincipalProvider, Session, StaticPrincipal, TokenValidator};
pub use config::{ServerConfig, DEFAULT_MAX_REQUEST_BYTES};
pub use dispatch::{parse_request, respond, RpcDispatcher};
pub use error::{sync_error_code, ServerError, ServerResult, AUTHENTICATION_FAILED};
pub use server::{SyncServer, METHOD_AUTHENTICATE};
