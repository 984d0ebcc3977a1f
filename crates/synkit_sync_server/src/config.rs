//! Server configuration.

use std::net::SocketAddr;
use synkit_codec::Principal;
use synkit_sync_engine::EngineConfig;

/// Default limit for one request line.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Application id remote keys must carry.
    pub app_id: String,
    /// Maximum size of one request line in bytes.
    pub max_request_bytes: usize,
    /// Principal used for unauthenticated connections.
    pub default_principal: Option<Principal>,
    /// Secret key for token validation (if auth enabled).
    pub auth_secret: Option<Vec<u8>>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            app_id: EngineConfig::default().app_id,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            default_principal: None,
            auth_secret: None,
        }
    }

    /// Sets the application id.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Sets the maximum request size.
    pub fn with_max_request_bytes(mut self, max: usize) -> Self {
        self.max_request_bytes = max;
        self
    }

    /// Sets the principal of unauthenticated connections.
    pub fn with_default_principal(mut self, principal: Principal) -> Self {
        self.default_principal = Some(principal);
        self
    }

    /// Enables token authentication with the given secret.
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.auth_secret = Some(secret);
        self
    }

    /// Returns true if connections must authenticate.
    pub fn require_auth(&self) -> bool {
        self.auth_secret.is_some()
    }

    /// Engine configuration matching this server.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.app_id.as_str())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}
