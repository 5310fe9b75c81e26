//! Domain models for the stream relay.
//!
//! This crate contains plain data structures describing one relay session:
//! where the transcoder pushes to, how a session is identified, and how the
//! transcoder ended. Models have no I/O - they're just data that can be passed
//! between layers.

pub mod error;
pub mod exit_report;
pub mod session_id;
pub mod transcode_target;

#[cfg(test)]
mod tests;

pub use error::model_error::ModelError;
pub use exit_report::ExitReport;
pub use session_id::SessionId;
pub use transcode_target::TranscodeTarget;
pub use transcode_target::builder::TranscodeTargetBuilder;
