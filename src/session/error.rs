//! Session Event Error Types
//!
//! Errors raised at the boundary of the session event subsystem.

use thiserror::Error;

use crate::config::ConfigError;

use super::state::SessionState;

/// Session event errors
#[derive(Error, Debug)]
pub enum SessionError {
    // Boundary errors
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Session event queue full ({capacity} events), dropped {state} for {endpoint}")]
    QueueFull {
        endpoint: String,
        state: SessionState,
        capacity: usize,
    },

    // Process lifecycle errors
    #[error("Process not running: {0}")]
    ProcessNotRunning(String),

    #[error("Process already running: {0}")]
    ProcessAlreadyRunning(String),

    #[error("Process stopped before replying: {0}")]
    ProcessStopped(String),

    #[error("No async runtime available to spawn {0}")]
    NoRuntime(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for session event operations
pub type SessionResult<T> = Result<T, SessionError>;
