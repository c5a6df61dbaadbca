//! Network infrastructure for the peer application.
//!
//! # Sub-modules
//!
//! - **`identity`** – Resolves this host's LAN address and picks the session
//!   port.  The pair is what other peers see in our announcements.
//!
//! - **`listener`** – The TCP rendezvous listener.  Publishes one
//!   `ConnectionAccepted` event per inbound socket.
//!
//! - **`discovery`** – The UDP broadcaster: sends `HELLO:<port>` every two
//!   seconds, filters what it hears, and drives the countdown and timeout
//!   timers of a discovery round.
//!
//! - **`connector`** – The one-shot outbound dial triggered by a discovery.
//!
//! - **`session`** – Reader and writer tasks of one established session.
//!
//! # Ownership of state (for beginners)
//!
//! Every socket and timer here runs in its own tokio task, so several of them
//! can fire at the same instant.  If they all wrote to a shared `phase`
//! variable, two of them could both believe they were the first to connect.
//! Instead they only *publish events* onto one `mpsc` queue, and the
//! `RendezvousService` task consumes that queue one event at a time.

use std::net::SocketAddr;

use lanlink_core::SessionId;
use thiserror::Error;

pub mod connector;
pub mod discovery;
pub mod identity;
pub mod listener;
pub mod session;

/// Errors produced by the rendezvous transports.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// A TCP or UDP socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// A socket option or address query failed after binding.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The session's writer has stopped; the session must be pruned.
    #[error("session {0} is closed")]
    SessionClosed(SessionId),
    /// The session's outbound queue is full.  The session itself is healthy.
    #[error("session {0} outbound queue is full")]
    SessionBusy(SessionId),
}
