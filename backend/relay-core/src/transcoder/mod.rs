//! External transcoder supervision.
//!
//! One [`ProcessSupervisor`] owns exactly one transcoder process for one relay
//! session. It provides:
//!
//! - Argument construction and spawn ([`spawn`])
//! - Ordered stdin feed through a single [`Feeder`]
//! - A stderr drain task emitting [`DiagnosticEvent`]s
//! - An exit-wait task publishing the [`ExitReport`](models::ExitReport)
//! - Idempotent SIGINT-based termination ([`process`])
//!
//! # State machine
//!
//! `Spawned -> Feeding -> {Stopping -> Exited | Crashed}`. Only `Feeding` accepts
//! chunks; `Exited` and `Crashed` are terminal.

pub mod diagnostics;
pub mod process;
pub mod spawn;
mod supervisor;

pub use diagnostics::{DiagnosticEvent, DiagnosticSnapshot, TranscodeProgress};
pub use supervisor::{FeedProgress, Feeder, ProcessSupervisor, SpawnedTranscoder, SupervisorState};
