//! Session Observers
//!
//! Modules holding session-scoped state register here to hear about every
//! transition. Delivery follows registration order.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::state::SessionState;
use crate::endpoint::Endpoint;

/// Handle returned by registration, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Receiver of session transitions
///
/// Called for every endpoint, not only ones the observer already knows.
/// An error (or panic) is logged and does not affect other observers.
pub trait SessionObserver: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Handle a transition for `endpoint`
    fn on_session_event(&self, endpoint: &Endpoint, state: SessionState) -> anyhow::Result<()>;
}

impl<F> SessionObserver for F
where
    F: Fn(&Endpoint, SessionState) -> anyhow::Result<()> + Send + Sync,
{
    fn on_session_event(&self, endpoint: &Endpoint, state: SessionState) -> anyhow::Result<()> {
        self(endpoint, state)
    }
}

/// An observer paired with the name it was registered under
pub struct NamedObserver<O> {
    name: String,
    inner: O,
}

impl<O: SessionObserver> NamedObserver<O> {
    pub fn new(name: impl Into<String>, inner: O) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl<O: SessionObserver> SessionObserver for NamedObserver<O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_session_event(&self, endpoint: &Endpoint, state: SessionState) -> anyhow::Result<()> {
        self.inner.on_session_event(endpoint, state)
    }
}

/// A registered observer
#[derive(Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub observer: Arc<dyn SessionObserver>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("name", &self.observer.name())
            .finish()
    }
}

/// Ordered list of observers shared between registrants and the process
#[derive(Debug, Default)]
pub struct SubscriberList {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer; it is notified after every earlier registration
    pub fn register(&self, observer: Arc<dyn SessionObserver>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber { id, observer });
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Copy of the current list in registration order
    ///
    /// Taken before each fan-out so observers may register or unregister
    /// from inside a callback.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}
