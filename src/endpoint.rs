//! Endpoint Identity
//!
//! Descriptor of a network peer used as the key for session tracking.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::session::error::{SessionError, SessionResult};

/// Transport flags carried by an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportFlags(u16);

impl TransportFlags {
    pub const NONE: Self = Self(0);
    pub const IPV4: Self = Self(1 << 0);
    pub const IPV6: Self = Self(1 << 1);
    pub const TCP: Self = Self(1 << 2);
    pub const SECURED: Self = Self(1 << 3);
    pub const MULTICAST: Self = Self(1 << 4);

    /// Raw bit representation
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Combine two flag sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove the bits of `other`
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl std::ops::BitOr for TransportFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// A network peer as seen by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Peer socket address
    pub addr: SocketAddr,
    /// Transport and security flags
    pub flags: TransportFlags,
    /// Logical device the endpoint belongs to
    pub device: usize,
    /// Local interface the peer was seen on (not part of the session key)
    pub interface_index: u32,
}

/// The part of an endpoint that identifies a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointKey {
    pub addr: SocketAddr,
    pub tcp: bool,
    pub secured: bool,
    pub device: usize,
}

impl Endpoint {
    /// Create an endpoint; the address family flag is derived from `addr`
    pub fn new(addr: SocketAddr, flags: TransportFlags) -> Self {
        let family = match addr.ip() {
            IpAddr::V4(_) => TransportFlags::IPV4,
            IpAddr::V6(_) => TransportFlags::IPV6,
        };
        let flags = flags
            .difference(TransportFlags::IPV4 | TransportFlags::IPV6)
            .union(family);

        Self {
            addr,
            flags,
            device: 0,
            interface_index: 0,
        }
    }

    /// Plain TCP endpoint
    pub fn tcp(addr: SocketAddr) -> Self {
        Self::new(addr, TransportFlags::TCP)
    }

    /// TLS-over-TCP endpoint
    pub fn secure_tcp(addr: SocketAddr) -> Self {
        Self::new(addr, TransportFlags::TCP | TransportFlags::SECURED)
    }

    /// Set the logical device index
    pub fn with_device(mut self, device: usize) -> Self {
        self.device = device;
        self
    }

    /// Set the local interface index
    pub fn with_interface(mut self, interface_index: u32) -> Self {
        self.interface_index = interface_index;
        self
    }

    pub fn is_tcp(&self) -> bool {
        self.flags.contains(TransportFlags::TCP)
    }

    pub fn is_secured(&self) -> bool {
        self.flags.contains(TransportFlags::SECURED)
    }

    /// Key used to index session records
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            addr: self.addr,
            tcp: self.is_tcp(),
            secured: self.is_secured(),
            device: self.device,
        }
    }

    /// Check that the endpoint can carry a session
    pub fn validate(&self, require_connection_oriented: bool) -> SessionResult<()> {
        let invalid = |reason: &str| {
            Err(SessionError::InvalidEndpoint {
                endpoint: self.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.addr.port() == 0 {
            return invalid("port is zero");
        }
        if self.addr.ip().is_unspecified() {
            return invalid("address is unspecified");
        }
        if self.addr.ip().is_multicast() || self.flags.contains(TransportFlags::MULTICAST) {
            return invalid("multicast endpoints carry no session");
        }

        let family_ok = match self.addr.ip() {
            IpAddr::V4(_) => {
                self.flags.contains(TransportFlags::IPV4) && !self.flags.contains(TransportFlags::IPV6)
            }
            IpAddr::V6(_) => {
                self.flags.contains(TransportFlags::IPV6) && !self.flags.contains(TransportFlags::IPV4)
            }
        };
        if !family_ok {
            return invalid("address family flag does not match address");
        }

        if require_connection_oriented && !self.is_tcp() {
            return invalid("not a connection-oriented transport");
        }

        Ok(())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match (self.is_tcp(), self.is_secured()) {
            (true, true) => "coaps+tcp",
            (true, false) => "coap+tcp",
            (false, true) => "coaps",
            (false, false) => "coap",
        };
        write!(f, "{}://{}", scheme, self.addr)?;
        if self.device != 0 {
            write!(f, "#{}", self.device)?;
        }
        Ok(())
    }
}
