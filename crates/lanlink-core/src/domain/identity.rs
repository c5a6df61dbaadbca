//! The local peer identity.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::protocol::announcement::Announcement;

/// This host's LAN address plus the TCP session port chosen at startup.
///
/// Created once when the process starts and never changed afterwards; a retry
/// after a discovery timeout reuses the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    /// First non-loopback IPv4 address, or `127.0.0.1` when there is none.
    pub address: Ipv4Addr,
    /// TCP port the rendezvous listener binds.
    pub port: u16,
}

impl Identity {
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    /// The announcement this peer broadcasts.
    pub fn announcement(&self) -> Announcement {
        Announcement::new(self.port)
    }

    /// Address other peers dial to reach this peer's listener.
    pub fn session_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
