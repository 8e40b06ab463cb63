use thiserror::Error;

/// Top-level error type for the worldsync runtime.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("observer '{name}' failed: {message}")]
    Observer { name: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why an inbound update message was rejected.
///
/// A rejected message is dropped on its own; it never closes the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("expected exactly one entity per message, found {0}")]
    EntityCount(usize),
}
