//! Error types for client operations.

use std::io;
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Message shown for any REST failure without a server-provided message.
pub const GENERIC_API_MESSAGE: &str = "Something went wrong; please try again later.";

/// Errors that can occur while talking to the training server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed packet or unexpected protocol state.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The REST API answered with a failure.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status, 0 for network-level failures.
        status: u16,
        /// Sanitized, user-facing message.
        message: String,
    },

    /// An operation did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Domain-level error.
    #[error(transparent)]
    Training(#[from] synapse_training::SynapseError),
}

impl ClientError {
    /// The message that may be shown to a user. Raw transport detail is never included.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Training(err) => err.user_message(),
            _ => GENERIC_API_MESSAGE.to_string(),
        }
    }
}
