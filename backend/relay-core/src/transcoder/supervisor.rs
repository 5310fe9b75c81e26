use crate::config::TranscoderConfig;
use crate::error::supervisor::SupervisorError;
use crate::transcoder::diagnostics::{DiagnosticEvent, DiagnosticSnapshot, DiagnosticStats};
use crate::transcoder::{process, spawn};

use common::ErrorLocation;
use models::{ExitReport, TranscodeTarget};

use std::io::Result as IoResult;
use std::panic::Location;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child as TokioChild, ChildStderr, ChildStdin};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

const DIAGNOSTIC_READ_BUFFER: usize = 4096;
const DIAGNOSTIC_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Spawned,
    Feeding,
    Stopping,
    Exited,
    Crashed,
}

impl SupervisorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SupervisorState::Exited | SupervisorState::Crashed)
    }
}

/// Everything a session needs from a freshly spawned transcoder.
pub struct SpawnedTranscoder {
    pub supervisor: ProcessSupervisor,
    pub feeder: Feeder,
    pub diagnostics: mpsc::Receiver<DiagnosticEvent>,
}

/// Owns one transcoder process: its state, exit report and termination.
///
/// Background tasks drain stderr and wait for exit; neither depends on the
/// session reading from them, so a stalled client never blocks the process.
pub struct ProcessSupervisor {
    pid: Option<u32>,
    state: Arc<watch::Sender<SupervisorState>>,
    exit: watch::Receiver<Option<ExitReport>>,
    interrupt_sent: AtomicBool,
    grace_period: Duration,
    diagnostics: Arc<DiagnosticStats>,
}

impl ProcessSupervisor {
    /// Spawn the transcoder for `target` and start its background tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Spawn`] if the program cannot be started and
    /// [`SupervisorError::Pipe`] if its stdin or stderr was not captured.
    pub fn spawn(
        config: &TranscoderConfig,
        target: &TranscodeTarget,
    ) -> Result<SpawnedTranscoder, SupervisorError> {
        let mut child = spawn::spawn_transcoder(&config.program, target)?;
        let pid = child.id();

        let stdin = child.stdin.take().ok_or_else(|| SupervisorError::Pipe {
            message: "Transcoder stdin was not captured".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| SupervisorError::Pipe {
            message: "Transcoder stderr was not captured".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let (state_tx, state_rx) = watch::channel(SupervisorState::Spawned);
        let state = Arc::new(state_tx);
        let (exit_tx, exit_rx) = watch::channel(None);
        let (event_tx, event_rx) = mpsc::channel(DIAGNOSTIC_CHANNEL_CAPACITY);
        let diagnostics = Arc::new(DiagnosticStats::default());

        TokioSpawn(drain_diagnostics(
            stderr,
            event_tx,
            Arc::clone(&diagnostics),
            pid,
        ));
        TokioSpawn(wait_for_exit(child, Arc::clone(&state), exit_tx, pid));

        let supervisor = ProcessSupervisor {
            pid,
            state,
            exit: exit_rx,
            interrupt_sent: AtomicBool::new(false),
            grace_period: config.stop_grace_period,
            diagnostics,
        };
        let feeder = Feeder {
            stdin: Some(stdin),
            state: state_rx,
            progress: Arc::new(FeedProgress::default()),
        };

        Ok(SpawnedTranscoder {
            supervisor,
            feeder,
            diagnostics: event_rx,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Exit report, once the process has been reaped.
    pub fn exit_report(&self) -> Option<ExitReport> {
        *self.exit.borrow()
    }

    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.diagnostics.snapshot()
    }

    /// Open the feed. Returns `false` if the process already left `Spawned`.
    pub fn begin_feeding(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SupervisorState::Spawned {
                *state = SupervisorState::Feeding;
                true
            } else {
                false
            }
        })
    }

    /// Send SIGINT to the transcoder, at most once per process.
    ///
    /// # Returns
    ///
    /// * `true` - This call delivered the interrupt
    /// * `false` - Already interrupted, already exited, or delivery failed
    pub fn interrupt(&self) -> bool {
        if self.interrupt_sent.swap(true, Ordering::SeqCst) {
            debug!("Transcoder (PID: {:?}) already interrupted", self.pid);
            return false;
        }

        let stopping = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = SupervisorState::Stopping;
                true
            }
        });
        if !stopping {
            debug!(
                "Transcoder (PID: {:?}) already exited, no interrupt sent",
                self.pid
            );
            return false;
        }

        match self.pid {
            Some(pid) => {
                let sent = process::send_interrupt(pid);
                info!("Sent SIGINT to transcoder PID {pid}: success={sent}");
                sent
            }
            None => {
                warn!("Transcoder has no PID, cannot interrupt");
                false
            }
        }
    }

    /// Wait until the process has exited and return its report.
    pub async fn wait_exit(&self) -> ExitReport {
        let mut exit = self.exit.clone();
        exit.wait_for(Option::is_some)
            .await
            .map(|report| *report)
            .ok()
            .flatten()
            .unwrap_or_else(ExitReport::unknown)
    }

    /// Interrupt, then kill if the process outlives the grace period.
    pub async fn stop(&self) -> ExitReport {
        self.interrupt();

        if let Ok(report) = timeout(self.grace_period, self.wait_exit()).await {
            return report;
        }

        warn!(
            "Transcoder (PID: {:?}) still running {:?} after SIGINT, killing",
            self.pid, self.grace_period
        );
        if let Some(pid) = self.pid {
            process::send_kill(pid);
        }

        match timeout(self.grace_period, self.wait_exit()).await {
            Ok(report) => report,
            Err(_) => {
                error!(
                    "Transcoder (PID: {:?}) did not exit after SIGKILL (still running: {})",
                    self.pid,
                    self.pid.is_some_and(process::is_running)
                );
                ExitReport::unknown()
            }
        }
    }
}

/// Running totals of what a [`Feeder`] has written.
///
/// Shared, so the totals stay readable after the feeder moves into a task.
#[derive(Debug, Default)]
pub struct FeedProgress {
    chunks: AtomicU64,
    bytes: AtomicU64,
}

impl FeedProgress {
    fn record(&self, len: usize) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Sole writer to the transcoder's stdin.
///
/// Taking `&mut self` serializes writes, so chunks reach the process in the
/// order `feed` is called.
pub struct Feeder {
    stdin: Option<ChildStdin>,
    state: watch::Receiver<SupervisorState>,
    progress: Arc<FeedProgress>,
}

impl Feeder {
    /// Write one media chunk to the transcoder, in full.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotFeeding`] outside the `Feeding` state and
    /// [`SupervisorError::Feed`] when the write fails. After a failed write the
    /// input is closed and every later call fails.
    pub async fn feed(&mut self, chunk: &[u8]) -> Result<(), SupervisorError> {
        let state = *self.state.borrow();
        if state != SupervisorState::Feeding {
            return Err(SupervisorError::NotFeeding {
                state,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SupervisorError::Pipe {
                message: "Transcoder input already closed".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        if let Err(e) = write_chunk(stdin, chunk).await {
            self.stdin = None;
            return Err(SupervisorError::Feed {
                message: format!("Failed to write {} bytes to transcoder", chunk.len()),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            });
        }

        self.progress.record(chunk.len());
        trace!("Fed {} bytes to transcoder", chunk.len());
        Ok(())
    }

    /// Close the transcoder's input. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        self.stdin.take().is_some()
    }

    pub fn progress(&self) -> Arc<FeedProgress> {
        Arc::clone(&self.progress)
    }

    pub fn chunks_fed(&self) -> u64 {
        self.progress.chunks()
    }

    pub fn bytes_fed(&self) -> u64 {
        self.progress.bytes()
    }
}

async fn write_chunk(stdin: &mut ChildStdin, chunk: &[u8]) -> IoResult<()> {
    stdin.write_all(chunk).await?;
    stdin.flush().await
}

async fn drain_diagnostics(
    mut stderr: ChildStderr,
    events: mpsc::Sender<DiagnosticEvent>,
    stats: Arc<DiagnosticStats>,
    pid: Option<u32>,
) {
    let mut buf = vec![0u8; DIAGNOSTIC_READ_BUFFER];

    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => {
                trace!("Transcoder (PID: {pid:?}) stderr closed");
                break;
            }
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                debug!("Transcoder (PID: {pid:?}) stderr: {}", text.trim_end());
                stats.record(&text, n);

                match events.try_send(DiagnosticEvent { bytes: n }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        trace!("Diagnostic notice dropped, session is behind");
                    }
                    // Session is gone; keep draining until the process exits.
                    Err(TrySendError::Closed(_)) => {}
                }
            }
            Err(e) => {
                warn!("Failed to read transcoder (PID: {pid:?}) stderr: {e}");
                break;
            }
        }
    }
}

async fn wait_for_exit(
    mut child: TokioChild,
    state: Arc<watch::Sender<SupervisorState>>,
    exit: watch::Sender<Option<ExitReport>>,
    pid: Option<u32>,
) {
    let report = match child.wait().await {
        Ok(status) => exit_report(status),
        Err(e) => {
            error!("Failed to wait for transcoder (PID: {pid:?}): {e}");
            ExitReport::unknown()
        }
    };

    state.send_modify(|current| {
        *current = if *current == SupervisorState::Stopping || report.success() {
            SupervisorState::Exited
        } else {
            SupervisorState::Crashed
        };
    });

    info!("Transcoder process closed (PID: {pid:?}), {report}");
    exit.send_replace(Some(report));
}

fn exit_report(status: ExitStatus) -> ExitReport {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    ExitReport::new(status.code(), signal)
}
