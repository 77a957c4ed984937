//! Session Lifecycle Events
//!
//! Serializes session start/end notifications from the network layer and
//! fans them out to every module holding session-scoped state:
//! - Per-endpoint session records (connect, refresh, disconnect)
//! - Single-consumer event queue fed by concurrent producers
//! - Ordered, failure-isolated observer fan-out
//! - Process-wide diagnostics for dropped and ignored events

pub mod error;
pub mod events;
pub mod observer;
pub mod process;
pub mod registry;
pub mod state;

pub use error::{SessionError, SessionResult};
pub use events::{Diagnostic, DiagnosticEmitter, SessionEvent};
pub use observer::{NamedObserver, SessionObserver, SubscriberId, SubscriberList};
pub use process::{handle_session, SessionEventProcess};
pub use registry::{Dispatch, SessionRegistry};
pub use state::{SessionInfo, SessionPhase, SessionRecord, SessionState, Transition};
