//! Session Registry
//!
//! Session records keyed by endpoint, owned by the session event process.
//! Only the process loop mutates it, so it carries no locks.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::observer::Subscriber;
use super::state::{SessionInfo, SessionRecord, SessionState, Transition};
use crate::endpoint::{Endpoint, EndpointKey};

/// Result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub transition: Transition,
    /// Subscribers the event was delivered to
    pub notified: usize,
    /// Deliveries that returned an error or panicked
    pub failed: usize,
}

/// Table of live sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<EndpointKey, SessionRecord>,
    /// Last sequence number handed out
    sequence: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `state` for `endpoint`, then notify `subscribers` in order
    pub fn handle(
        &mut self,
        endpoint: &Endpoint,
        state: SessionState,
        subscribers: &[Subscriber],
    ) -> Dispatch {
        let key = endpoint.key();
        let transition = self.apply(key, endpoint, state);

        let mut dispatch = Dispatch {
            transition,
            notified: 0,
            failed: 0,
        };

        match transition {
            Transition::Ignored => return dispatch,
            Transition::Opened => info!("Session opened: {}", endpoint),
            Transition::Refreshed => debug!("Session refreshed: {}", endpoint),
            Transition::Closed => info!("Session closed: {}", endpoint),
        }

        if let Some(record) = self.sessions.get_mut(&key) {
            for subscriber in subscribers {
                if !record.mark_notified(subscriber.id) {
                    continue;
                }
                dispatch.notified += 1;
                if !deliver(subscriber, endpoint, state) {
                    dispatch.failed += 1;
                }
            }
        }

        if transition == Transition::Closed {
            self.sessions.remove(&key);
        }

        dispatch
    }

    /// Validate and record the transition without notifying anyone
    fn apply(&mut self, key: EndpointKey, endpoint: &Endpoint, state: SessionState) -> Transition {
        let live = self.sessions.get(&key).map_or(false, |r| r.is_connected());

        match (state, live) {
            (SessionState::Connected, true) => {
                let sequence = self.next_sequence();
                if let Some(record) = self.sessions.get_mut(&key) {
                    record.refresh(*endpoint, sequence);
                }
                Transition::Refreshed
            }
            (SessionState::Connected, false) => {
                let sequence = self.next_sequence();
                self.sessions.insert(key, SessionRecord::open(*endpoint, sequence));
                Transition::Opened
            }
            (SessionState::Disconnected, true) => {
                let sequence = self.next_sequence();
                if let Some(record) = self.sessions.get_mut(&key) {
                    record.close(sequence);
                }
                Transition::Closed
            }
            (SessionState::Disconnected, false) => Transition::Ignored,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Get the record for an endpoint
    pub fn get(&self, endpoint: &Endpoint) -> Option<&SessionRecord> {
        self.sessions.get(&endpoint.key())
    }

    /// Check if an endpoint has a live session
    pub fn is_connected(&self, endpoint: &Endpoint) -> bool {
        self.get(endpoint).map(|r| r.is_connected()).unwrap_or(false)
    }

    /// Snapshot of every record, ordered by endpoint key
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut keys: Vec<&EndpointKey> = self.sessions.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|k| self.sessions.get(k))
            .map(SessionInfo::from)
            .collect()
    }

    /// Get total session count
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Last sequence number handed out
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Call one subscriber, containing errors and panics
fn deliver(subscriber: &Subscriber, endpoint: &Endpoint, state: SessionState) -> bool {
    let observer = &subscriber.observer;
    match catch_unwind(AssertUnwindSafe(|| observer.on_session_event(endpoint, state))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(
                "Subscriber {} ({}) failed on {} for {}: {:#}",
                observer.name(),
                subscriber.id,
                state,
                endpoint,
                e
            );
            false
        }
        Err(_) => {
            error!(
                "Subscriber {} ({}) panicked on {} for {}",
                observer.name(),
                subscriber.id,
                state,
                endpoint
            );
            false
        }
    }
}
