//! Line-delimited JSON-RPC server.

use crate::auth::{AuthConfig, PrincipalProvider, Session, StaticPrincipal, TokenValidator};
use crate::config::ServerConfig;
use crate::dispatch::{parse_request, respond, RpcDispatcher};
use crate::error::{ServerError, ServerResult};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use synkit_storage::EntityStore;
use synkit_sync_engine::SyncEngine;
use synkit_sync_protocol::{Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Method that binds a token's principal to the connection.
pub const METHOD_AUTHENTICATE: &str = "authenticate";

const INTERNAL_ERROR_LINE: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"internal error"}}"#;

/// The sync server.
///
/// Reads one JSON-RPC request per line and writes one response per line.
/// Each connection runs on its own task; requests on a connection are
/// handled in order.
///
/// # Example
///
/// ```
/// use synkit_storage::InMemoryStore;
/// use synkit_sync_server::{ServerConfig, Session, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default(), InMemoryStore::new());
/// let mut session = Session::default();
///
/// let reply = server
///     .handle_line(r#"{"jsonrpc":"2.0","method":"test","params":[1],"id":1}"#, &mut session)
///     .unwrap();
/// assert_eq!(reply, r#"{"jsonrpc":"2.0","id":1,"result":1}"#);
/// ```
pub struct SyncServer<S: EntityStore> {
    config: ServerConfig,
    dispatcher: RpcDispatcher<S>,
    principals: Arc<dyn PrincipalProvider>,
}

impl<S: EntityStore + 'static> SyncServer<S> {
    /// Creates a server with its own engine over `store`.
    pub fn new(config: ServerConfig, store: S) -> Self {
        let engine = SyncEngine::new(config.engine_config(), store);
        Self::with_engine(config, Arc::new(engine))
    }

    /// Creates a server over an existing engine.
    ///
    /// The principal provider follows the configuration: a
    /// [`TokenValidator`] if an auth secret is set, otherwise a
    /// [`StaticPrincipal`] with the default principal.
    pub fn with_engine(config: ServerConfig, engine: Arc<SyncEngine<S>>) -> Self {
        let principals: Arc<dyn PrincipalProvider> = match &config.auth_secret {
            Some(secret) => Arc::new(TokenValidator::new(AuthConfig::new(secret.clone()))),
            None => Arc::new(StaticPrincipal::new(config.default_principal.clone())),
        };
        Self {
            dispatcher: RpcDispatcher::new(engine),
            principals,
            config,
        }
    }

    /// Replaces the principal provider.
    #[must_use]
    pub fn with_principal_provider(mut self, principals: Arc<dyn PrincipalProvider>) -> Self {
        self.principals = principals;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the dispatcher.
    pub fn dispatcher(&self) -> &RpcDispatcher<S> {
        &self.dispatcher
    }

    /// Handles one request line on `session`.
    ///
    /// Returns the response line, or `None` for notifications.
    pub fn handle_line(&self, line: &str, session: &mut Session) -> Option<String> {
        let response = self.handle_request_line(line, session)?;
        Some(to_line(&response))
    }

    fn too_large(&self, size: usize) -> ServerError {
        ServerError::RequestTooLarge {
            size,
            limit: self.config.max_request_bytes,
        }
    }

    fn handle_request_line(&self, line: &str, session: &mut Session) -> Option<Response> {
        if line.len() > self.config.max_request_bytes {
            let err = self.too_large(line.len());
            warn!(peer = ?session.peer, error = %err, "request rejected");
            return Some(respond(None, Err(err)));
        }

        let request = match parse_request(line) {
            Ok(request) => request,
            Err(response) => return Some(response),
        };

        if request.method == METHOD_AUTHENTICATE {
            let outcome = self.authenticate(&request, session);
            return request.id.clone().map(|id| respond(Some(id), outcome));
        }

        let principal = self.principals.principal(session);
        self.dispatcher.handle(&request, principal.as_ref())
    }

    fn authenticate(&self, request: &Request, session: &mut Session) -> ServerResult<serde_json::Value> {
        let [token] = request.params.as_slice() else {
            return Err(ServerError::invalid_params("authenticate expects [token]"));
        };
        let token = token
            .as_str()
            .ok_or_else(|| ServerError::invalid_params("token must be a string"))?;

        match self.principals.authenticate(token) {
            Ok(principal) => {
                info!(peer = ?session.peer, principal = %principal, "authenticated");
                let reply = json!({ "principal": principal.email() });
                session.principal = Some(principal);
                Ok(reply)
            }
            Err(err) => {
                warn!(peer = ?session.peer, error = %err, "authentication failed");
                Err(err)
            }
        }
    }

    /// Binds the configured address and serves until the process ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or accepting fails.
    pub async fn run(self: Arc<Self>) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Accepts connections on `listener` until `shutdown` completes.
    ///
    /// Connections already accepted keep running on their own tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting a connection fails.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        info!(addr = ?listener.local_addr().ok(), app_id = %self.config.app_id, "sync server listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "connection accepted");
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = server.handle_connection(stream, peer).await {
                            warn!(%peer, error = %err, "connection failed");
                        }
                    });
                }
                () = &mut shutdown => {
                    info!("sync server shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> ServerResult<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut session = Session::new(Some(peer));

        let limit = self.config.max_request_bytes;

        loop {
            let reply = match read_frame(&mut reader, limit, &mut buf).await? {
                Frame::Eof => break,
                Frame::TooLarge(size) => Some(reject(self.too_large(size), &session)),
                Frame::NotUtf8 => Some(reject(
                    ServerError::Parse("request is not valid UTF-8".to_string()),
                    &session,
                )),
                Frame::Line(line) if line.trim().is_empty() => None,
                Frame::Line(line) => self.handle_line(&line, &mut session),
            };
            if let Some(reply) = reply {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        debug!(%peer, "connection closed");
        Ok(())
    }
}

fn reject(err: ServerError, session: &Session) -> String {
    warn!(peer = ?session.peer, error = %err, "request rejected");
    to_line(&respond(None, Err(err)))
}

fn to_line(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        error!(error = %e, "failed to serialize response");
        INTERNAL_ERROR_LINE.to_string()
    })
}

/// One newline-terminated request read from a connection.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line(String),
    /// The line exceeded the limit; it was read and dropped in pieces.
    TooLarge(usize),
    NotUtf8,
    Eof,
}

/// Reads the next line, buffering at most `limit + 1` bytes of it.
///
/// The trailing `\n` (and `\r`) is stripped. A final line without a newline
/// is returned as is.
async fn read_frame<R>(reader: &mut R, limit: usize, buf: &mut Vec<u8>) -> std::io::Result<Frame>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    buf.clear();
    let cap = limit.saturating_add(1);
    let read = (&mut *reader).take(cap as u64).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if read == cap {
        let dropped = discard_line(reader).await?;
        return Ok(Frame::TooLarge(read + dropped));
    }

    Ok(match String::from_utf8(std::mem::take(buf)) {
        Ok(line) => Frame::Line(line),
        Err(_) => Frame::NotUtf8,
    })
}

/// Skips input up to and including the next newline. Returns the number of
/// bytes skipped before it.
async fn discard_line<R>(reader: &mut R) -> std::io::Result<usize>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut dropped = 0;
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(dropped);
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(dropped + pos);
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
                dropped += len;
            }
        }
    }
}
