//! Network Event Mutex
//!
//! Process-wide lock serializing producers of network events. The I/O path
//! may already hold it when it reports a connect or disconnect, so the lock
//! is re-entrant on the owning thread.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::Arc;

/// Scoped acquisition of the network event mutex
pub type NetworkEventGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// Lock shared between the network layer and the session event entry points
#[derive(Debug, Clone, Default)]
pub struct NetworkEventMutex {
    inner: Arc<ReentrantMutex<()>>,
}

impl NetworkEventMutex {
    /// Create a new, unlocked mutex
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutex for the lifetime of the returned guard
    pub fn lock(&self) -> NetworkEventGuard<'_> {
        self.inner.lock()
    }

    /// Acquire the mutex without blocking
    pub fn try_lock(&self) -> Option<NetworkEventGuard<'_>> {
        self.inner.try_lock()
    }

    /// Check whether any thread holds the mutex
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
