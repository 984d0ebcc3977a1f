//! Token command implementation.

use synkit_codec::Principal;
use synkit_sync_server::{AuthConfig, TokenValidator};

/// Runs the token command.
pub fn run(principal: &str, secret: &str) -> Result<(), Box<dyn std::error::Error>> {
    let validator = TokenValidator::new(AuthConfig::new(secret.as_bytes().to_vec()));
    println!("{}", validator.create_token(&Principal::new(principal))?);
    Ok(())
}
