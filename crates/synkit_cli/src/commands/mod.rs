//! CLI command implementations.

pub mod inspect;
pub mod key;
pub mod rpc;
pub mod serve;
pub mod token;
