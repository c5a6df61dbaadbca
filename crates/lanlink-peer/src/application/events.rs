//! Events consumed by the rendezvous service, and the handle that sends them.
//!
//! Every transport task and every user command reaches the service as one
//! [`PeerEvent`] on a single bounded queue.  The service processes them
//! strictly in arrival order, which is what makes the first-wins rule and the
//! stale-round checks race-free.

use std::io;
use std::net::SocketAddr;

use lanlink_core::{Round, SessionId};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Which discovery timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// One-second countdown step.
    CountdownTick,
    /// The search window elapsed.
    SearchTimeout,
}

/// Input to the rendezvous service.
#[derive(Debug)]
pub enum PeerEvent {
    // ── Transports ────────────────────────────────────────────────────────
    /// A foreign announcement was heard during `round`.
    DiscoveryReceived { round: Round, peer: SocketAddr },
    /// The listener accepted an inbound connection.
    ConnectionAccepted { stream: TcpStream, remote: SocketAddr },
    /// An outbound dial started in `round` finished.
    ConnectDone {
        round: Round,
        remote: SocketAddr,
        result: io::Result<TcpStream>,
    },
    /// A discovery timer of `round` fired.
    TimerFired { round: Round, timer: TimerKind },
    /// A session read produced data.
    DataReceived { session: SessionId, text: String },
    /// A session reached EOF or a read error.
    PeerClosed { session: SessionId },

    // ── User commands ─────────────────────────────────────────────────────
    /// Relay a chat message to every open session.
    SendMessage(String),
    /// Start a new search round after a timeout.
    Retry,
    /// Decline the retry offered after a timeout.
    Cancel,
    /// Tear everything down and stop the service.
    Shutdown,
}

/// The service has stopped and no longer accepts commands.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("rendezvous service has stopped")]
pub struct ServiceStopped;

/// Cloneable handle for talking to a running `RendezvousService`.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    tx: mpsc::Sender<PeerEvent>,
}

impl PeerHandle {
    pub(crate) fn new(tx: mpsc::Sender<PeerEvent>) -> Self {
        Self { tx }
    }

    /// Relays `text` to every connected peer.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), ServiceStopped> {
        self.dispatch(PeerEvent::SendMessage(text.into())).await
    }

    pub async fn retry(&self) -> Result<(), ServiceStopped> {
        self.dispatch(PeerEvent::Retry).await
    }

    pub async fn cancel(&self) -> Result<(), ServiceStopped> {
        self.dispatch(PeerEvent::Cancel).await
    }

    pub async fn shutdown(&self) -> Result<(), ServiceStopped> {
        self.dispatch(PeerEvent::Shutdown).await
    }

    /// Injects an arbitrary event, as a transport would.
    ///
    /// Used by tests to simulate a discovery without a broadcast domain.
    pub async fn dispatch(&self, event: PeerEvent) -> Result<(), ServiceStopped> {
        self.tx.send(event).await.map_err(|_| ServiceStopped)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_commands_arrive_in_order() {
        // Arrange
        let (tx, mut rx) = mpsc::channel(8);
        let handle = PeerHandle::new(tx);

        // Act
        handle.send_message("hi").await.unwrap();
        handle.retry().await.unwrap();
        handle.shutdown().await.unwrap();

        // Assert
        assert!(matches!(rx.recv().await, Some(PeerEvent::SendMessage(t)) if t == "hi"));
        assert!(matches!(rx.recv().await, Some(PeerEvent::Retry)));
        assert!(matches!(rx.recv().await, Some(PeerEvent::Shutdown)));
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_service() {
        let (tx, rx) = mpsc::channel(1);
        let handle = PeerHandle::new(tx);
        drop(rx);
        assert_eq!(handle.cancel().await, Err(ServiceStopped));
    }
}
