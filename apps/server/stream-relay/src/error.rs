use common::ErrorLocation;

use relay_core::error::CoreError;

use thiserror::Error;

/// Errors that stop the relay process from starting or running.
#[derive(Debug, Error)]
pub enum StreamRelayError {
    /// Error from this binary (logging, signals, filesystem)
    #[error("Stream Relay Error: {message} {location}")]
    App {
        message: String,
        location: ErrorLocation,
    },

    /// Error from relay-core (config, server)
    #[error("Core Error: {0}")]
    Core(#[from] CoreError),
}
