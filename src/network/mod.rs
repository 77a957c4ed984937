//! Network Layer Boundary
//!
//! Primitives shared with the network I/O layer that produces session events.

pub mod mutex;

pub use mutex::{NetworkEventGuard, NetworkEventMutex};
