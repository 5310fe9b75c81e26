//! Relay WebSocket server implementation.
//!
//! Accepts connections on the configured path, extracts the stream key from
//! the query and hands each connection to its own session task.

use crate::STREAM_KEY_PARAM;
use crate::config::RelayConfig;
use crate::error::relay::RelayError;
use crate::relay::handle::RelayServerHandle;
use crate::relay::session;
use crate::relay::session_table::SessionTable;

use common::{ErrorLocation, RedactedStreamKey};

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::time::{sleep as TokioSleep, timeout};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, Uri};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Shared by every session of one server.
#[derive(Clone)]
pub(crate) struct RelayContext {
    pub(crate) config: Arc<RelayConfig>,
    pub(crate) sessions: SessionTable,
}

/// Start the relay server.
///
/// Binds `server.host:server.port` and spawns the accept loop in the
/// background. Port `0` binds an ephemeral port; read it back from
/// [`RelayServerHandle::local_addr`].
///
/// # Errors
///
/// Returns [`RelayError::Io`] if the address cannot be bound.
pub async fn start_relay_server(config: RelayConfig) -> Result<RelayServerHandle, RelayError> {
    let address = config.listen_address();
    let listener = TcpListener::bind(&address).await?;
    let local_addr = listener.local_addr()?;
    let path = config.server.path.clone();

    info!("Relay server listening on ws://{local_addr}{path}");

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();
    let sessions = SessionTable::new(config.server.max_sessions);
    let context = RelayContext {
        config: Arc::new(config),
        sessions: sessions.clone(),
    };

    let accept_task = TokioSpawn(accept_loop(
        listener,
        context,
        shutdown.clone(),
        tracker.clone(),
    ));

    Ok(RelayServerHandle::new(
        local_addr,
        path,
        shutdown,
        accept_task,
        tracker,
        sessions,
    ))
}

async fn accept_loop(
    listener: TcpListener,
    context: RelayContext,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Relay server no longer accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("Client connecting from {addr}");
                    let context = context.clone();
                    let cancel = shutdown.child_token();
                    tracker.spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, context, cancel).await {
                            warn!("Connection from {addr} ended with error: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                    TokioSleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    context: RelayContext,
    cancel: CancellationToken,
) -> Result<(), RelayError> {
    let relay_path = context.config.server.path.clone();
    let handshake_timeout = context.config.server.handshake_timeout;
    let mut request_uri: Option<Uri> = None;

    let upgrade = accept_hdr_async(stream, |request: &Request, response: Response| {
        if request.uri().path() != relay_path {
            warn!(
                "Rejected upgrade from {addr} for unknown path {}",
                request.uri().path()
            );
            return Err(not_found_response());
        }
        request_uri = Some(request.uri().clone());
        Ok(response)
    });

    let upgraded = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Dropped {addr} mid-handshake, server shutting down");
            return Err(RelayError::Handshake {
                message: "Server shut down before the handshake completed".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        upgraded = timeout(handshake_timeout, upgrade) => upgraded,
    };

    let ws_stream = match upgraded {
        Ok(Ok(ws_stream)) => ws_stream,
        Ok(Err(e)) => {
            error!("WebSocket handshake with {addr} failed: {e}");
            return Err(RelayError::Handshake {
                message: format!("WebSocket handshake failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Err(_) => {
            warn!("WebSocket handshake with {addr} timed out after {handshake_timeout:?}");
            return Err(RelayError::Handshake {
                message: format!("WebSocket handshake timed out after {handshake_timeout:?}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    let stream_key = extract_stream_key(request_uri.as_ref().and_then(Uri::query));
    debug!(
        "Connection from {addr} upgraded, stream key present: {}",
        stream_key.is_some()
    );

    session::run_session(ws_stream, addr, stream_key, context, cancel).await
}

/// Pull the stream key out of a raw (still percent-encoded) query string.
///
/// Returns the first `key` parameter, decoded. An empty value is returned as
/// is; the session rejects blank keys.
pub fn extract_stream_key(query: Option<&str>) -> Option<RedactedStreamKey> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == STREAM_KEY_PARAM)
        .map(|(_, value)| RedactedStreamKey::new(value.into_owned()))
}

fn not_found_response() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("Not Found".to_string()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
