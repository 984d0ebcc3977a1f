//! Principal lookup and token authentication.
//!
//! The engine only needs to know who is calling. A [`PrincipalProvider`]
//! answers that per connection: [`StaticPrincipal`] hands every connection
//! the same (possibly absent) principal, [`TokenValidator`] accepts
//! HMAC-SHA256 signed tokens sent with the `authenticate` method.
//!
//! ## Token Format
//!
//! `<principal>.<issued_at>.<signature>`, where `issued_at` is Unix millis
//! and `signature` is the hex HMAC-SHA256 of `<principal>.<issued_at>`.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use synkit_codec::Principal;

type HmacSha256 = Hmac<Sha256>;

/// Per-connection state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Remote address, if the connection has one.
    pub peer: Option<SocketAddr>,
    /// Principal established by `authenticate`.
    pub principal: Option<Principal>,
}

impl Session {
    /// Creates an unauthenticated session.
    pub fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            peer,
            principal: None,
        }
    }
}

/// Resolves the principal of a request.
pub trait PrincipalProvider: Send + Sync {
    /// Returns the principal requests on `session` run as.
    fn principal(&self, session: &Session) -> Option<Principal>;

    /// Verifies a token sent with `authenticate`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AuthenticationFailed`] if the token is not
    /// accepted. The default rejects every token.
    fn authenticate(&self, _token: &str) -> ServerResult<Principal> {
        Err(ServerError::AuthenticationFailed(
            "authentication is not enabled".into(),
        ))
    }
}

/// Gives every connection the same principal unless it authenticated.
#[derive(Debug, Clone, Default)]
pub struct StaticPrincipal {
    principal: Option<Principal>,
}

impl StaticPrincipal {
    /// Creates a provider returning `principal`.
    pub fn new(principal: Option<Principal>) -> Self {
        Self { principal }
    }

    /// Creates a provider for anonymous callers.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl PrincipalProvider for StaticPrincipal {
    fn principal(&self, session: &Session) -> Option<Principal> {
        session
            .principal
            .clone()
            .or_else(|| self.principal.clone())
    }
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and checks signed principal tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a token for `principal`, issued now.
    ///
    /// # Errors
    ///
    /// Returns an error if the HMAC cannot be initialized.
    pub fn create_token(&self, principal: &Principal) -> ServerResult<String> {
        self.create_token_at(principal, now_millis())
    }

    fn create_token_at(&self, principal: &Principal, issued_at: u64) -> ServerResult<String> {
        let data = format!("{}.{issued_at}", principal.email());
        let signature = hex::encode(self.mac(&data)?.finalize().into_bytes());
        Ok(format!("{data}.{signature}"))
    }

    /// Validates a token and returns the principal it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AuthenticationFailed`] if the token is
    /// malformed, forged or expired.
    pub fn validate_token(&self, token: &str) -> ServerResult<Principal> {
        let failed = |message: &str| ServerError::AuthenticationFailed(message.into());

        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(issued_at), Some(email)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(failed("malformed token"));
        };
        if email.is_empty() {
            return Err(failed("malformed token"));
        }

        let signature = hex::decode(signature).map_err(|_| failed("malformed signature"))?;
        let signed = &token[..email.len() + 1 + issued_at.len()];
        self.mac(signed)?
            .verify_slice(&signature)
            .map_err(|_| failed("invalid signature"))?;

        let issued_at: u64 = issued_at.parse().map_err(|_| failed("malformed timestamp"))?;
        let expiry_millis = u64::try_from(self.config.token_expiry.as_millis()).unwrap_or(u64::MAX);
        if now_millis() > issued_at.saturating_add(expiry_millis) {
            return Err(failed("token expired"));
        }

        Ok(Principal::new(email))
    }

    fn mac(&self, data: &str) -> ServerResult<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::internal(e.to_string()))?;
        mac.update(data.as_bytes());
        Ok(mac)
    }
}

impl PrincipalProvider for TokenValidator {
    fn principal(&self, session: &Session) -> Option<Principal> {
        session.principal.clone()
    }

    fn authenticate(&self, token: &str) -> ServerResult<Principal> {
        self.validate_token(token)
    }
}

fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}
