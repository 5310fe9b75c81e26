//! Live session bookkeeping using the actor pattern.
//!
//! Inserts and removals are commands processed one at a time by a dedicated
//! task, so the duplicate-key check and the capacity check are race-free.
//! Reads go straight to the shared `RwLock`.

use crate::error::relay::RelayError;

use common::ErrorLocation;
use models::SessionId;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// A live session as seen by the table.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub connection_id: Uuid,
    pub peer: SocketAddr,
    pub started_at: Instant,
    pub cancel: CancellationToken,
}

/// Why an insert was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertRejection {
    Duplicate,
    Full,
}

/// Commands that mutate the session table.
#[derive(Debug)]
pub(crate) enum TableCommand {
    Insert {
        id: SessionId,
        entry: SessionEntry,
        reply: oneshot::Sender<Result<(), InsertRejection>>,
    },

    /// Remove `id` only if it still belongs to `connection_id`.
    Remove { id: SessionId, connection_id: Uuid },
}

/// Table of live sessions, one per stream key.
///
/// `Clone` shares the same underlying table.
#[derive(Clone)]
pub struct SessionTable {
    command_tx: Arc<Mutex<Option<mpsc::Sender<TableCommand>>>>,
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    actor_init: Arc<Mutex<bool>>,
    max_sessions: usize,
}

impl SessionTable {
    /// The actor is spawned lazily on the first mutation.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            actor_init: Arc::new(Mutex::new(false)),
            max_sessions,
        }
    }

    /// Register a new live session.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Setup`] if the key already has a live session or
    /// the table is full, and [`RelayError::SessionTable`] if the actor died.
    pub async fn insert(&self, id: SessionId, entry: SessionEntry) -> Result<(), RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(TableCommand::Insert {
            id,
            entry,
            reply: reply_tx,
        })
        .await?;

        let reply = reply_rx.await.map_err(|e| RelayError::SessionTable {
            message: format!("Session table actor dropped insert reply: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        match reply {
            Ok(()) => Ok(()),
            Err(InsertRejection::Duplicate) => Err(RelayError::Setup {
                message: "stream key already live".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(InsertRejection::Full) => Err(RelayError::Setup {
                message: "relay at capacity".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Remove a session when its connection ends.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SessionTable`] if the actor died.
    pub async fn remove(&self, id: SessionId, connection_id: Uuid) -> Result<(), RelayError> {
        self.send(TableCommand::Remove { id, connection_id }).await
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    async fn send(&self, cmd: TableCommand) -> Result<(), RelayError> {
        self.ensure_actor().await;

        let tx_guard = self.command_tx.lock().await;
        let tx = tx_guard.as_ref().ok_or_else(|| RelayError::SessionTable {
            message: "Session table actor not initialized".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        tx.send(cmd).await.map_err(|e| RelayError::SessionTable {
            message: format!("Session table actor died: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(table_actor(
                rx,
                Arc::clone(&self.sessions),
                self.max_sessions,
            ));
            *init_guard = true;
            debug!("Session table actor spawned");
        }
    }
}

async fn table_actor(
    mut command_rx: mpsc::Receiver<TableCommand>,
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    max_sessions: usize,
) {
    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            TableCommand::Insert { id, entry, reply } => {
                let mut sessions_write = sessions.write().await;

                let outcome = if sessions_write.contains_key(&id) {
                    warn!("Rejected {id} from {}: key already live", entry.peer);
                    Err(InsertRejection::Duplicate)
                } else if sessions_write.len() >= max_sessions {
                    warn!(
                        "Rejected {id} from {}: {max_sessions} sessions already live",
                        entry.peer
                    );
                    Err(InsertRejection::Full)
                } else {
                    info!(
                        "Registered {id} for {} ({} live)",
                        entry.peer,
                        sessions_write.len() + 1
                    );
                    sessions_write.insert(id, entry);
                    Ok(())
                };
                drop(sessions_write);

                if reply.send(outcome).is_err() {
                    debug!("Insert requester went away before the reply");
                }
            }
            TableCommand::Remove { id, connection_id } => {
                let mut sessions_write = sessions.write().await;
                match sessions_write.get(&id) {
                    Some(entry) if entry.connection_id == connection_id => {
                        sessions_write.remove(&id);
                        info!("Removed {id} ({} live)", sessions_write.len());
                    }
                    Some(_) => debug!("{id} now belongs to another connection, not removed"),
                    None => debug!("{id} not in session table"),
                }
            }
        }
    }

    debug!("Session table actor stopped");
}
