//! Serve command implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use synkit_codec::Principal;
use synkit_storage::{EntityStore, FileStore, InMemoryStore};
use synkit_sync_server::{ServerConfig, SyncServer};
use tracing::{info, warn};

/// Options of the serve command.
pub struct ServeOptions {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Application id.
    pub app_id: String,
    /// Store file; entities stay in memory if absent.
    pub store: Option<PathBuf>,
    /// Principal of unauthenticated connections.
    pub principal: Option<String>,
    /// Token secret.
    pub auth_secret: Option<String>,
    /// Request line limit.
    pub max_request_bytes: usize,
}

impl ServeOptions {
    fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.bind)
            .with_app_id(self.app_id.as_str())
            .with_max_request_bytes(self.max_request_bytes);
        if let Some(principal) = &self.principal {
            config = config.with_default_principal(Principal::new(principal.as_str()));
        }
        if let Some(secret) = &self.auth_secret {
            config = config.with_auth(secret.as_bytes().to_vec());
        }
        config
    }
}

/// Runs the serve command.
pub fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.config();
    let runtime = tokio::runtime::Runtime::new()?;

    match &options.store {
        Some(path) => {
            let store = FileStore::open_with_create_dirs(path)?;
            info!(path = %path.display(), entities = store.len()?, "opened store");
            runtime.block_on(serve(config, store))
        }
        None => {
            warn!("no store path given, entities are kept in memory only");
            runtime.block_on(serve(config, InMemoryStore::new()))
        }
    }
}

async fn serve<S: EntityStore + 'static>(
    config: ServerConfig,
    store: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(SyncServer::new(config, store));
    let listener = tokio::net::TcpListener::bind(server.config().bind_addr).await?;

    server
        .serve(listener, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
