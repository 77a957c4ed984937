//! Session Events
//!
//! Queued transition requests and the process-wide diagnostic channel.

use log::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::state::SessionState;
use crate::endpoint::Endpoint;

/// A transition requested by the network layer, consumed once by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEvent {
    pub endpoint: Endpoint,
    pub state: SessionState,
}

impl SessionEvent {
    pub fn connected(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: SessionState::Connected,
        }
    }

    pub fn disconnected(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: SessionState::Disconnected,
        }
    }
}

/// Conditions reported on the process-wide diagnostic channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Diagnostic {
    /// Endpoint rejected at the boundary
    InvalidEndpoint { endpoint: String, reason: String },

    /// Queue had no room; the event was dropped
    QueueFull {
        endpoint: String,
        state: SessionState,
        capacity: usize,
    },

    /// Event arrived while the process was stopped; it was dropped
    ProcessNotRunning {
        process: String,
        endpoint: String,
        state: SessionState,
    },

    /// Disconnect for an endpoint without a live session
    TransitionIgnored { endpoint: String, state: SessionState },
}

impl Diagnostic {
    /// Whether an event was lost before reaching the handler
    pub fn is_dropped_event(&self) -> bool {
        matches!(
            self,
            Self::InvalidEndpoint { .. } | Self::QueueFull { .. } | Self::ProcessNotRunning { .. }
        )
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEndpoint { endpoint, reason } => {
                write!(f, "rejected invalid endpoint {}: {}", endpoint, reason)
            }
            Self::QueueFull {
                endpoint,
                state,
                capacity,
            } => write!(
                f,
                "dropped {} for {}: queue full ({} events)",
                state, endpoint, capacity
            ),
            Self::ProcessNotRunning {
                process,
                endpoint,
                state,
            } => write!(f, "dropped {} for {}: {} not running", state, endpoint, process),
            Self::TransitionIgnored { endpoint, state } => {
                write!(f, "ignored {} for {}: no live session", state, endpoint)
            }
        }
    }
}

/// Publishes diagnostics to the log and to any listeners
#[derive(Debug, Clone)]
pub struct DiagnosticEmitter {
    tx: broadcast::Sender<Diagnostic>,
}

impl DiagnosticEmitter {
    /// Create an emitter buffering up to `capacity` diagnostics per listener
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to diagnostics emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }

    /// Log a diagnostic and publish it
    pub fn emit(&self, diagnostic: Diagnostic) {
        warn!("Session event {}", diagnostic);

        // No listeners is fine
        let _ = self.tx.send(diagnostic);
    }
}
