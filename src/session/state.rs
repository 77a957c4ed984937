//! Session State
//!
//! Per-endpoint session records and the transitions they accept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::observer::SubscriberId;
use crate::endpoint::Endpoint;

/// State reported by the network layer for an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Transport session is up
    Connected,
    /// Transport session went away
    Disconnected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Phase of a tracked session. An endpoint without a record is in no phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Connected,
    Disconnected,
}

impl From<SessionPhase> for SessionState {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::Connected => SessionState::Connected,
            SessionPhase::Disconnected => SessionState::Disconnected,
        }
    }
}

/// Outcome of applying a requested state to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No record existed (or it was disconnected); a new session opened
    Opened,
    /// Record was already connected; sequence bumped
    Refreshed,
    /// Connected record closed and removed
    Closed,
    /// Disconnect for an endpoint with no live session
    Ignored,
}

impl Transition {
    /// Whether the transition is forwarded to subscribers
    pub fn dispatches(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Bookkeeping for one endpoint's session
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Endpoint as last reported by the network layer
    pub endpoint: Endpoint,
    /// Identifier of this session generation
    pub session_id: Uuid,
    /// Current phase
    pub phase: SessionPhase,
    /// Sequence number of the last accepted transition
    pub sequence: u64,
    /// Number of refreshes since the session opened
    pub refreshes: u32,
    /// Subscribers that observed the current phase
    notified: HashSet<SubscriberId>,
    /// When the session opened
    pub opened_at: DateTime<Utc>,
    /// When the last transition was accepted
    pub last_activity: DateTime<Utc>,
}

impl SessionRecord {
    /// Open a new session generation
    pub fn open(endpoint: Endpoint, sequence: u64) -> Self {
        let now = Utc::now();
        Self {
            endpoint,
            session_id: Uuid::new_v4(),
            phase: SessionPhase::Connected,
            sequence,
            refreshes: 0,
            notified: HashSet::new(),
            opened_at: now,
            last_activity: now,
        }
    }

    /// Refresh a connected session without changing its generation
    pub fn refresh(&mut self, endpoint: Endpoint, sequence: u64) {
        self.endpoint = endpoint;
        self.sequence = sequence;
        self.refreshes += 1;
        self.last_activity = Utc::now();
    }

    /// Move to the disconnected phase; the notified set starts over
    pub fn close(&mut self, sequence: u64) {
        self.phase = SessionPhase::Disconnected;
        self.sequence = sequence;
        self.notified.clear();
        self.last_activity = Utc::now();
    }

    pub fn is_connected(&self) -> bool {
        self.phase == SessionPhase::Connected
    }

    /// Check whether a subscriber already observed the current phase
    pub fn was_notified(&self, id: SubscriberId) -> bool {
        self.notified.contains(&id)
    }

    /// Record delivery of the current phase; returns false if already delivered
    pub fn mark_notified(&mut self, id: SubscriberId) -> bool {
        self.notified.insert(id)
    }

    /// Get session age in seconds
    pub fn duration_secs(&self) -> i64 {
        (self.last_activity - self.opened_at).num_seconds()
    }
}

/// Serializable session info for snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub endpoint: String,
    pub phase: SessionPhase,
    pub sequence: u64,
    pub refreshes: u32,
    pub opened_at: String,
    pub last_activity: String,
    pub duration_secs: i64,
}

impl From<&SessionRecord> for SessionInfo {
    fn from(record: &SessionRecord) -> Self {
        Self {
            session_id: record.session_id,
            endpoint: record.endpoint.to_string(),
            phase: record.phase,
            sequence: record.sequence,
            refreshes: record.refreshes,
            opened_at: record.opened_at.to_rfc3339(),
            last_activity: record.last_activity.to_rfc3339(),
            duration_secs: record.duration_secs(),
        }
    }
}
