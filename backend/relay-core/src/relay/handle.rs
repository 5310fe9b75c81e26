//! Relay server handle type.

use crate::relay::session_table::SessionTable;

use std::net::SocketAddr;

use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Handle to a running relay server.
///
/// Returned by [`start_relay_server`](crate::relay::start_relay_server).
/// Dropping the handle does not stop the server; call [`shutdown`](Self::shutdown).
///
/// # Examples
///
/// ```no_run
/// use relay_core::config::RelayConfig;
/// use relay_core::relay::start_relay_server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = start_relay_server(RelayConfig::default()).await?;
///     println!("relay at {}", handle.url());
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct RelayServerHandle {
    local_addr: SocketAddr,
    path: String,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
    tracker: TaskTracker,
    sessions: SessionTable,
}

impl RelayServerHandle {
    pub(crate) fn new(
        local_addr: SocketAddr,
        path: String,
        shutdown: CancellationToken,
        accept_task: JoinHandle<()>,
        tracker: TaskTracker,
        sessions: SessionTable,
    ) -> Self {
        Self {
            local_addr,
            path,
            shutdown,
            accept_task,
            tracker,
            sessions,
        }
    }

    /// Address the listener is bound to. Resolves port `0` to the real port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL of the relay endpoint, without a stream key.
    pub fn url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.path)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Stop accepting, end every live session and wait for their teardown.
    ///
    /// Each session stops its transcoder with the usual interrupt-then-kill
    /// sequence before this returns.
    pub async fn shutdown(self) {
        info!(
            "Shutting down relay server ({} live sessions)",
            self.sessions.len().await
        );
        self.shutdown.cancel();

        if let Err(e) = self.accept_task.await {
            error!("Relay accept loop failed: {e}");
        }

        self.tracker.close();
        self.tracker.wait().await;
        info!("Relay server stopped");
    }
}
