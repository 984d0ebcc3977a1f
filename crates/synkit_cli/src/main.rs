//! Synkit CLI
//!
//! Command-line tools for running and inspecting a Synkit sync server.
//!
//! # Commands
//!
//! - `serve` - Run the line-delimited JSON-RPC server
//! - `rpc` - Apply JSON-RPC requests from a file or stdin to a store
//! - `inspect` - List the sync records of a store
//! - `decode-key` / `encode-key` - Convert between remote keys and paths
//! - `token` - Issue an authentication token

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Synkit sync server tools.
#[derive(Parser)]
#[command(name = "synkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON store file
    #[arg(global = true, short, long, env = "SYNKIT_STORE")]
    store: Option<PathBuf>,

    /// Application id remote keys must carry
    #[arg(global = true, short, long, env = "SYNKIT_APP_ID", default_value = "synkit")]
    app_id: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync server
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "SYNKIT_BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Principal of unauthenticated connections
        #[arg(short, long, env = "SYNKIT_PRINCIPAL")]
        principal: Option<String>,

        /// Require `authenticate` with tokens signed by this secret
        #[arg(long, env = "SYNKIT_AUTH_SECRET")]
        auth_secret: Option<String>,

        /// Maximum request line size in bytes
        #[arg(long, default_value_t = synkit_sync_server::DEFAULT_MAX_REQUEST_BYTES)]
        max_request_bytes: usize,
    },

    /// Apply JSON-RPC requests, one per line
    Rpc {
        /// Request file (stdin if omitted)
        input: Option<PathBuf>,

        /// Principal the requests run as
        #[arg(short, long, env = "SYNKIT_PRINCIPAL")]
        principal: Option<String>,
    },

    /// List sync records
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode a remote key
    DecodeKey {
        /// Base64 remote key
        key: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Encode a path such as `Author:"salinger" Book:42` as a remote key
    EncodeKey {
        /// Path elements, `Kind:name`, `Kind:"name"`, `Kind:42` or `Kind:?`
        #[arg(required = true)]
        path: Vec<String>,

        /// Namespace (default if omitted)
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Issue an authentication token
    Token {
        /// Principal the token is issued to
        principal: String,

        /// Secret the server was started with
        #[arg(long, env = "SYNKIT_AUTH_SECRET")]
        auth_secret: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            principal,
            auth_secret,
            max_request_bytes,
        } => {
            let options = commands::serve::ServeOptions {
                bind,
                app_id: cli.app_id,
                store: cli.store,
                principal,
                auth_secret,
                max_request_bytes,
            };
            commands::serve::run(options)?;
        }
        Commands::Rpc { input, principal } => {
            let store = cli.store.ok_or("Store path required for rpc")?;
            commands::rpc::run(&store, &cli.app_id, input.as_deref(), principal)?;
        }
        Commands::Inspect { format } => {
            let store = cli.store.ok_or("Store path required for inspect")?;
            commands::inspect::run(&store, &cli.app_id, &format)?;
        }
        Commands::DecodeKey { key, format } => {
            commands::key::decode(&key, &format)?;
        }
        Commands::EncodeKey { path, namespace } => {
            commands::key::encode(&cli.app_id, namespace, &path)?;
        }
        Commands::Token {
            principal,
            auth_secret,
        } => {
            commands::token::run(&principal, &auth_secret)?;
        }
        Commands::Version => {
            println!("Synkit CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Sync protocol methods: {}, {}, {}",
                synkit_sync_protocol::METHOD_SYNC_ENTITY,
                synkit_sync_protocol::METHOD_SYNC_DELETED_ENTITY,
                synkit_sync_protocol::METHOD_TEST
            );
        }
    }

    Ok(())
}
