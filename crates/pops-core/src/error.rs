//! Shared error type across pOps crates.

use thiserror::Error;

/// Message returned to clients while no model is available.
pub const MODEL_NOT_LOADED_MSG: &str = "Model not loaded. Please try again later.";

/// Message returned to clients when the classifier call failed.
pub const INFERENCE_FAILED_MSG: &str = "Failed to process text";

/// Stable error kinds (used for logs and metric labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Model construction failed at startup.
    ModelLoad,
    /// Model never loaded or load failed.
    ModelUnavailable,
    /// Underlying classification call errored.
    InferenceFailed,
    /// Reserved; empty input is replaced with a sentinel instead.
    MalformedInput,
    /// Invalid configuration.
    BadConfig,
    /// Internal server error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ModelLoad => "model_load",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::InferenceFailed => "inference_failed",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::BadConfig => "bad_config",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PopsError>;

/// Unified error type used by core and server.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PopsError {
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("model not loaded")]
    ModelUnavailable,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PopsError {
    /// Map internal error to a stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PopsError::ModelLoad(_) => ErrorKind::ModelLoad,
            PopsError::ModelUnavailable => ErrorKind::ModelUnavailable,
            PopsError::InferenceFailed(_) => ErrorKind::InferenceFailed,
            PopsError::MalformedInput(_) => ErrorKind::MalformedInput,
            PopsError::BadConfig(_) => ErrorKind::BadConfig,
            PopsError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message placed in the `{"error": ...}` payload.
    ///
    /// Details stay in the logs; clients only see these fixed strings.
    pub fn client_message(&self) -> &'static str {
        match self {
            PopsError::ModelLoad(_) | PopsError::ModelUnavailable => MODEL_NOT_LOADED_MSG,
            PopsError::InferenceFailed(_) => INFERENCE_FAILED_MSG,
            PopsError::MalformedInput(_) => "Malformed input",
            PopsError::BadConfig(_) | PopsError::Internal(_) => "Internal error",
        }
    }
}
