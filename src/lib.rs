//! Session lifecycle event dispatch for constrained-device network endpoints.
//!
//! The network layer reports that a transport session started or ended for
//! an [`Endpoint`]; a [`SessionEventProcess`] serializes those reports and
//! notifies every registered [`SessionObserver`] in registration order.

pub mod config;
pub mod endpoint;
pub mod network;
pub mod session;

pub use config::{ConfigError, SessionEventsConfig};
pub use endpoint::{Endpoint, EndpointKey, TransportFlags};
pub use network::NetworkEventMutex;
pub use session::{
    Diagnostic, SessionError, SessionEventProcess, SessionInfo, SessionObserver, SessionResult,
    SessionState, SubscriberId,
};
