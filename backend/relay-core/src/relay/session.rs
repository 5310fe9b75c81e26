//! One relay session: one client connection paired with one transcoder.

use crate::error::relay::RelayError;
use crate::error::supervisor::SupervisorError;
use crate::relay::message::{InboundMessage, text_message};
use crate::relay::server::RelayContext;
use crate::relay::session_table::SessionEntry;
use crate::transcoder::{DiagnosticEvent, Feeder, ProcessSupervisor, SpawnedTranscoder};
use crate::{DIAGNOSTIC_NOTICE, READY_ACK, SETUP_ERROR_PREFIX};

use common::{ErrorLocation, RedactedStreamKey};
use models::{ExitReport, SessionId};

use std::fmt;
use std::net::SocketAddr;
use std::panic::Location;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use tokio::net::TcpStream;
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;
type FeedTask = JoinHandle<Result<(), SupervisorError>>;

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The client sent a close frame or the stream ended.
    ClientClosed,
    /// Reading from or writing to the client failed.
    ClientLost(String),
    /// The transcoder exited on its own.
    TranscoderExited(ExitReport),
    /// Writing a media chunk to the transcoder failed.
    FeedFailed(SupervisorError),
    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ClientClosed => write!(f, "client closed"),
            SessionEnd::ClientLost(reason) => write!(f, "client lost: {reason}"),
            SessionEnd::TranscoderExited(report) => write!(f, "transcoder exited, {report}"),
            SessionEnd::FeedFailed(e) => write!(f, "feed failed: {e}"),
            SessionEnd::Shutdown => write!(f, "server shutdown"),
        }
    }
}

struct PreparedSession {
    session_id: SessionId,
    transcoder: SpawnedTranscoder,
}

pub(crate) async fn run_session(
    ws_stream: WebSocketStream<TcpStream>,
    peer: SocketAddr,
    stream_key: Option<RedactedStreamKey>,
    context: RelayContext,
    cancel: CancellationToken,
) -> Result<(), RelayError> {
    let connection_id = Uuid::new_v4();
    let (mut write, read) = ws_stream.split();

    send_text(&mut write, READY_ACK).await?;
    debug!("Sent {READY_ACK} to {peer} ({connection_id})");

    let prepared = match prepare_session(peer, connection_id, stream_key, &context, &cancel).await {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!("Session setup for {peer} failed: {e}");
            reject(&mut write, &client_reason(&e)).await;
            return Err(e);
        }
    };

    let PreparedSession {
        session_id,
        transcoder,
    } = prepared;
    let SpawnedTranscoder {
        supervisor,
        feeder,
        diagnostics,
    } = transcoder;

    supervisor.begin_feeding();
    info!("{session_id} live for {peer}");
    let started = Instant::now();

    let progress = feeder.progress();
    let (media_tx, media_rx) = mpsc::channel(context.config.transcoder.feed_queue_chunks);
    let mut feed_task = Some(TokioSpawn(feed_media(feeder, media_rx)));

    let end = relay_frames(
        &mut write,
        read,
        &supervisor,
        media_tx,
        &mut feed_task,
        diagnostics,
        &cancel,
    )
    .await;

    if let Some(task) = feed_task {
        let drain_for = match end {
            SessionEnd::ClientClosed => context.config.transcoder.stop_grace_period,
            _ => Duration::ZERO,
        };
        finish_feeding(task, drain_for).await;
    }

    let report = match &end {
        SessionEnd::TranscoderExited(report) => {
            close_client(&mut write).await;
            *report
        }
        _ => {
            supervisor.interrupt();
            close_client(&mut write).await;
            supervisor.stop().await
        }
    };

    if let Err(e) = context
        .sessions
        .remove(session_id.clone(), connection_id)
        .await
    {
        warn!("Failed to remove {session_id} from session table: {e}");
    }

    let summary = format!(
        "{session_id} ended after {:?} ({end}): fed {} chunks / {} bytes, transcoder {report}, diagnostics {}",
        started.elapsed(),
        progress.chunks(),
        progress.bytes(),
        supervisor.diagnostics()
    );
    match end {
        SessionEnd::FeedFailed(_) | SessionEnd::ClientLost(_) => warn!("{summary}"),
        _ => info!("{summary}"),
    }

    Ok(())
}

async fn prepare_session(
    peer: SocketAddr,
    connection_id: Uuid,
    stream_key: Option<RedactedStreamKey>,
    context: &RelayContext,
    cancel: &CancellationToken,
) -> Result<PreparedSession, RelayError> {
    let stream_key = match stream_key {
        Some(key) if !key.is_blank() => key,
        _ => {
            return Err(RelayError::Setup {
                message: "missing stream key".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    let target = context
        .config
        .transcoder
        .target_for(stream_key)
        .map_err(SupervisorError::from)?;
    let session_id = SessionId::from_stream_key(target.stream_key());

    context
        .sessions
        .insert(
            session_id.clone(),
            SessionEntry {
                connection_id,
                peer,
                started_at: Instant::now(),
                cancel: cancel.clone(),
            },
        )
        .await?;

    match ProcessSupervisor::spawn(&context.config.transcoder, &target) {
        Ok(transcoder) => Ok(PreparedSession {
            session_id,
            transcoder,
        }),
        Err(e) => {
            if let Err(remove_err) = context.sessions.remove(session_id, connection_id).await {
                warn!("Failed to release session after spawn failure: {remove_err}");
            }
            Err(e.into())
        }
    }
}

async fn relay_frames(
    write: &mut WsSink,
    mut read: WsSource,
    supervisor: &ProcessSupervisor,
    media: mpsc::Sender<Bytes>,
    feed_task: &mut Option<FeedTask>,
    mut diagnostics: mpsc::Receiver<DiagnosticEvent>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let mut diagnostics_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break SessionEnd::Shutdown,

            report = supervisor.wait_exit() => break SessionEnd::TranscoderExited(report),

            fed = join_feed(feed_task), if feed_task.is_some() => break feed_end(fed),

            event = diagnostics.recv(), if diagnostics_open => match event {
                Some(event) => {
                    trace!("Transcoder wrote {} diagnostic bytes", event.bytes);
                    if let Err(e) = send_text(write, DIAGNOSTIC_NOTICE).await {
                        break SessionEnd::ClientLost(e.to_string());
                    }
                }
                None => diagnostics_open = false,
            },

            frame = read.next() => match frame {
                None | Some(Ok(Message::Close(_))) => break SessionEnd::ClientClosed,
                Some(Err(e)) => break SessionEnd::ClientLost(e.to_string()),
                Some(Ok(message)) => match InboundMessage::from(message) {
                    InboundMessage::Media(data) => match media.try_send(data) {
                        Ok(()) => {}
                        Err(TrySendError::Full(data)) => {
                            break SessionEnd::FeedFailed(SupervisorError::Backlog {
                                message: format!(
                                    "Transcoder input backlog full, {} chunks queued, dropped {} bytes",
                                    media.max_capacity(),
                                    data.len()
                                ),
                                location: ErrorLocation::from(Location::caller()),
                            });
                        }
                        // Feed task already finished; its result ends the session.
                        Err(TrySendError::Closed(_)) => break feed_end(join_feed(feed_task).await),
                    },
                    InboundMessage::Control(text) => {
                        debug!("Ignored {} byte text frame from client", text.len());
                    }
                    InboundMessage::Unknown => {}
                },
            },
        }
    }
}

/// Write queued media to the transcoder in arrival order until the queue closes.
async fn feed_media(
    mut feeder: Feeder,
    mut media: mpsc::Receiver<Bytes>,
) -> Result<(), SupervisorError> {
    while let Some(chunk) = media.recv().await {
        feeder.feed(&chunk).await?;
    }
    feeder.close();
    Ok(())
}

/// Await the feed task, clearing the slot once it has finished.
async fn join_feed(feed_task: &mut Option<FeedTask>) -> Result<Result<(), SupervisorError>, JoinError> {
    let joined = match feed_task.as_mut() {
        Some(task) => task.await,
        None => return std::future::pending().await,
    };
    *feed_task = None;
    joined
}

fn feed_end(joined: Result<Result<(), SupervisorError>, JoinError>) -> SessionEnd {
    let error = match joined {
        Ok(Err(e)) => e,
        Ok(Ok(())) => SupervisorError::Pipe {
            message: "Feed stopped while the session was live".to_string(),
            location: ErrorLocation::from(Location::caller()),
        },
        Err(e) => SupervisorError::Pipe {
            message: format!("Feed task failed: {e}"),
            location: ErrorLocation::from(Location::caller()),
        },
    };
    SessionEnd::FeedFailed(error)
}

/// Let the feed task flush what is queued for up to `drain_for`, then abort it.
///
/// Either way the transcoder's input is closed when this returns.
async fn finish_feeding(mut task: FeedTask, drain_for: Duration) {
    if !drain_for.is_zero() {
        match timeout(drain_for, &mut task).await {
            Ok(Ok(Ok(()))) => return,
            Ok(Ok(Err(e))) => {
                debug!("Feed ended with error while draining: {e}");
                return;
            }
            Ok(Err(e)) => {
                warn!("Feed task failed while draining: {e}");
                return;
            }
            Err(_) => warn!("Transcoder input still blocked after {drain_for:?}, closing it"),
        }
    }

    task.abort();
    if let Err(e) = task.await {
        if !e.is_cancelled() {
            warn!("Feed task failed: {e}");
        }
    }
}

fn client_reason(error: &RelayError) -> String {
    match error {
        RelayError::Setup { message, .. } => message.clone(),
        RelayError::Supervisor(SupervisorError::Target { .. }) => "invalid stream target".to_string(),
        RelayError::Supervisor(_) => "transcoder unavailable".to_string(),
        _ => "session setup failed".to_string(),
    }
}

async fn reject(write: &mut WsSink, reason: &str) {
    let notice = format!("{SETUP_ERROR_PREFIX}{reason}");
    if let Err(e) = send_text(write, &notice).await {
        debug!("Could not deliver setup error: {e}");
        return;
    }

    let frame = CloseFrame {
        code: CloseCode::Policy,
        reason: reason.to_string().into(),
    };
    if let Err(e) = write.send(Message::Close(Some(frame))).await {
        debug!("Could not send close frame: {e}");
    }
}

async fn close_client(write: &mut WsSink) {
    if let Err(e) = write.close().await {
        trace!("Client connection already closed: {e}");
    }
}

async fn send_text(write: &mut WsSink, text: &str) -> Result<(), RelayError> {
    write
        .send(text_message(text))
        .await
        .map_err(|e| RelayError::Send {
            message: format!("Failed to send text message: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
