//! Detection Backend Error Types

use thiserror::Error;

/// Errors that can occur while talking to the detection backend
#[derive(Debug, Clone, Error)]
pub enum DetectionError {
    /// Request could not complete (connection refused, timeout, reset)
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("Backend rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Backend answered but the body did not decode
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// HTTP client could not be constructed
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl DetectionError {
    /// Whether this error means the backend was unreachable
    pub fn is_transport(&self) -> bool {
        matches!(self, DetectionError::Transport(_))
    }
}

impl From<reqwest::Error> for DetectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DetectionError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            DetectionError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            DetectionError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DetectionError {
    fn from(err: serde_json::Error) -> Self {
        DetectionError::MalformedResponse(err.to_string())
    }
}
