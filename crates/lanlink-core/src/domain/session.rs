//! Session descriptors.
//!
//! A session is one established TCP connection to a peer.  The peer
//! application keeps the live socket halves; the domain only needs to know
//! who the session is with and which side opened it.

use std::net::SocketAddr;

use uuid::Uuid;

/// Unique identifier of a session within this process.
pub type SessionId = Uuid;

/// Which side of the rendezvous race produced the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Accepted by our rendezvous listener.
    Inbound,
    /// Dialled by our connector after a discovery.
    Outbound,
}

/// Descriptor of one open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    /// Remote socket address of the peer.
    pub remote: SocketAddr,
    pub origin: SessionOrigin,
}

impl SessionInfo {
    /// Creates a descriptor with a fresh random id.
    pub fn new(remote: SocketAddr, origin: SessionOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote,
            origin,
        }
    }
}
