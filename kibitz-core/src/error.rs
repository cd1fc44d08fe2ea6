//! Error types for kibitz-core

use std::time::Duration;

use thiserror::Error;

/// Errors returned to callers of the session manager
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Malformed caller input, rejected before any process I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine process backing the session cannot be used
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(#[from] EngineError),
}

impl AnalysisError {
    /// Short machine-readable kind, used by hosts that report errors as data
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidArgument(_) => "invalid_argument",
            AnalysisError::EngineUnavailable(_) => "engine_unavailable",
        }
    }
}

/// Reasons an engine process cannot be reached
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine binary not found: {0}")]
    NotFound(String),

    #[error("Failed to spawn engine process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Engine process exited unexpectedly: code {code:?}")]
    ProcessExited { code: Option<i32> },

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine did not finish its search within {0:?}")]
    Timeout(Duration),

    #[error("Engine session closed")]
    Closed,
}
