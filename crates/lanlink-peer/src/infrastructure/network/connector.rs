//! Outbound dial to a discovered peer.
//!
//! The dial runs on its own task so the service keeps processing events (an
//! inbound accept may win the race while the dial is still in flight).  The
//! outcome comes back as [`PeerEvent::ConnectDone`], tagged with the round
//! that started it.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use lanlink_core::Round;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::application::events::PeerEvent;

/// Dials discovered peers with a bounded connect timeout.
#[derive(Debug, Clone, Copy)]
pub struct PeerConnector {
    connect_timeout: Duration,
}

impl PeerConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Starts dialing `remote`.  Returns immediately.
    pub fn connect(&self, remote: SocketAddr, round: Round, events: mpsc::Sender<PeerEvent>) {
        let limit = self.connect_timeout;
        tokio::spawn(async move {
            debug!("dialing {remote}");
            let result = match tokio::time::timeout(limit, TcpStream::connect(remote)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no answer within {} ms", limit.as_millis()),
                )),
            };
            let _ = events
                .send(PeerEvent::ConnectDone {
                    round,
                    remote,
                    result,
                })
                .await;
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_reports_success_with_round() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        // Act
        PeerConnector::new(Duration::from_secs(2)).connect(remote, 3, tx);
        let event = rx.recv().await.expect("connect outcome");

        // Assert
        match event {
            PeerEvent::ConnectDone { round, remote: r, result } => {
                assert_eq!(round, 3);
                assert_eq!(r, remote);
                assert!(result.is_ok());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_reports_refused_port() {
        // Arrange: bind then drop to get a port nobody listens on
        let remote = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap()
        };
        let (tx, mut rx) = mpsc::channel(4);

        // Act
        PeerConnector::new(Duration::from_secs(2)).connect(remote, 1, tx);

        // Assert
        match rx.recv().await {
            Some(PeerEvent::ConnectDone { result, .. }) => assert!(result.is_err()),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
