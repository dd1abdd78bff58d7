//! Error types for Palaver.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate participant name: {0}")]
    DuplicateName(String),

    #[error("'{0}' has no draft receiver to send to")]
    NoReceiver(String),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Transcript persistence failed: {0}")]
    Persistence(String),

    #[error("Handler '{participant}' failed: {message}")]
    Handler {
        participant: String,
        message: String,
    },

    #[error("Generator error: {0}")]
    Generator(#[from] crate::providers::GeneratorError),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("{0}")]
    Other(String),
}
