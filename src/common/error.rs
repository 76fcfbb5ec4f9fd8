//! Error types for the BDD runner
//!
//! Messages are written to be shown to the person driving the run, so they
//! name the failing step and, where possible, what to check next.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the BDD runner
#[derive(Error, Debug)]
pub enum Error {
    // === Session Errors ===
    #[error("An execution session is already active. Wait for it to finish or abort it first")]
    SessionAlreadyActive,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("JSON parsing error: {0}")]
    MalformedResponse(String),

    #[error("Execution timed out after {0} seconds. Server may be unresponsive")]
    Timeout(u64),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Error closing connection: {0}")]
    CloseFailed(String),

    // === API Errors ===
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // === Compiler Errors ===
    #[error("Test plan has {} unrecognized step(s): {}", .0.len(), .0.join("; "))]
    UnrecognizedSteps(Vec<String>),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an API error from a response status and message
    pub fn api(status: u16, message: &str) -> Self {
        Self::Api {
            status,
            message: message.to_string(),
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_steps_message_lists_phrases() {
        let err = Error::UnrecognizedSteps(vec!["step one".into(), "step two".into()]);
        assert_eq!(
            err.to_string(),
            "Test plan has 2 unrecognized step(s): step one; step two"
        );
    }

    #[test]
    fn test_session_messages() {
        assert_eq!(
            Error::Timeout(30).to_string(),
            "Execution timed out after 30 seconds. Server may be unresponsive"
        );
        assert_eq!(
            Error::CloseFailed("reset".into()).to_string(),
            "Error closing connection: reset"
        );
        assert_eq!(
            Error::MalformedResponse("EOF".into()).to_string(),
            "JSON parsing error: EOF"
        );
    }
}
