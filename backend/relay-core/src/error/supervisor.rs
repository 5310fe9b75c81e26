use crate::transcoder::SupervisorState;

use common::ErrorLocation;
use models::ModelError;

use std::error::Error as StdError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SupervisorError {
    #[error("Target Error: {message} {location}")]
    Target {
        message: String,
        location: ErrorLocation,
    },

    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Pipe Error: {message} {location}")]
    Pipe {
        message: String,
        location: ErrorLocation,
    },

    #[error("Feed Error: {message} {location}")]
    Feed {
        message: String,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("Backlog Error: {message} {location}")]
    Backlog {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Feeding Error: transcoder is {state:?} {location}")]
    NotFeeding {
        state: SupervisorState,
        location: ErrorLocation,
    },
}

impl From<ModelError> for SupervisorError {
    #[track_caller]
    fn from(error: ModelError) -> Self {
        SupervisorError::Target {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
