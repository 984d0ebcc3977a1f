//! Rpc command implementation.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use synkit_codec::Principal;
use synkit_storage::FileStore;
use synkit_sync_server::{ServerConfig, Session, SyncServer};
use tracing::info;

/// Runs the rpc command.
///
/// Reads requests from `input` (stdin if `None`) and prints one response
/// line per request that has an id.
pub fn run(
    store: &Path,
    app_id: &str,
    input: Option<&Path>,
    principal: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    let stdout = io::stdout();
    apply(store, app_id, reader, principal, &mut stdout.lock())
}

fn apply(
    store: &Path,
    app_id: &str,
    reader: impl BufRead,
    principal: Option<String>,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default().with_app_id(app_id);
    if let Some(principal) = principal {
        config = config.with_default_principal(Principal::new(principal));
    }
    let server = SyncServer::new(config, FileStore::open_with_create_dirs(store)?);
    let mut session = Session::default();

    let mut handled = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(reply) = server.handle_line(&line, &mut session) {
            writeln!(out, "{reply}")?;
        }
        handled += 1;
    }

    info!(requests = handled, stats = ?server.dispatcher().engine().stats(), "requests applied");
    Ok(())
}
