use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a redacted secret is asked to leave the process in plain form.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Serialization Error: {message} {location}")]
    Serialization {
        message: String,
        location: ErrorLocation,
    },
}
