//! Shared building blocks for the stream relay.
//!
//! This crate holds the small pieces every other crate leans on:
//! error location tracking and redacted credential handling.
//!
//! ## Architecture
//!
//! - **common** (this crate): Error plumbing and secret wrappers
//! - **models**: Pure data structures (targets, session ids, exit reports)
//! - **relay-core**: Transcoder supervision and the WebSocket relay
//! - **stream-relay**: The server binary wiring everything together

pub mod error;
pub mod redacted_stream_key;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_stream_key::RedactedStreamKey;
