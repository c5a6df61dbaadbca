//! TCP rendezvous listener.
//!
//! Binds the session port chosen at startup and hands every inbound socket to
//! the service as a [`PeerEvent::ConnectionAccepted`].  The listener makes no
//! decisions of its own: whether an accept wins the rendezvous race, joins an
//! already connected round, or arrives too late is decided by the service.
//!
//! The listener stays open while a session is connected, so a second inbound
//! connection is still accepted into the session set.  It is closed when a
//! search round times out and reopened on retry.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::NetworkError;
use crate::application::events::PeerEvent;

/// Pause after a failed `accept` so a persistent error (e.g. EMFILE) does not
/// spin the accept loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// The TCP rendezvous listener.
#[derive(Debug, Default)]
pub struct RendezvousListener {
    task: Option<JoinHandle<()>>,
    /// Aborted accept task whose socket may not be closed yet.
    closing: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl RendezvousListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `0.0.0.0:port` and starts accepting.
    ///
    /// Returns the bound address, which differs from `port` only when `port`
    /// is 0.  A running listener is stopped first, and the previous socket is
    /// fully closed before the new one is bound, so restarting on the same
    /// port works.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the port cannot be bound.
    pub async fn start(
        &mut self,
        port: u16,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<SocketAddr, NetworkError> {
        self.stop();
        if let Some(previous) = self.closing.take() {
            // Resolves once the aborted task has dropped its socket.
            let _ = previous.await;
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        let local = listener.local_addr()?;

        self.task = Some(tokio::spawn(accept_loop(listener, events)));
        self.local_addr = Some(local);
        info!("rendezvous listener on TCP {local}");
        Ok(local)
    }

    /// Closes the listening socket.  Safe to call when not started.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.closing = Some(task);
            info!("rendezvous listener stopped");
        }
        self.local_addr = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for RendezvousListener {
    fn drop(&mut self) {
        for task in self.task.iter().chain(self.closing.iter()) {
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, events: mpsc::Sender<PeerEvent>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                debug!("inbound connection from {remote}");
                if events
                    .send(PeerEvent::ConnectionAccepted { stream, remote })
                    .await
                    .is_err()
                {
                    // Service is gone.
                    break;
                }
            }
            Err(e) => {
                warn!("accept failed: {e}");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_start_on_port_zero_reports_bound_port() {
        // Arrange
        let (tx, _rx) = mpsc::channel(8);
        let mut listener = RendezvousListener::new();

        // Act
        let addr = listener.start(0, tx).await.expect("bind ephemeral port");

        // Assert
        assert_ne!(addr.port(), 0);
        assert!(listener.is_running());
        assert_eq!(listener.local_addr(), Some(addr));
    }

    #[tokio::test]
    async fn test_inbound_connection_is_published() {
        // Arrange
        let (tx, mut rx) = mpsc::channel(8);
        let mut listener = RendezvousListener::new();
        let addr = listener.start(0, tx).await.unwrap();

        // Act
        let client = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("accept event in time")
            .expect("channel open");

        // Assert
        match event {
            PeerEvent::ConnectionAccepted { remote, .. } => {
                assert_eq!(remote, client.local_addr().unwrap());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (tx, _rx) = mpsc::channel(8);
        let mut listener = RendezvousListener::new();
        listener.stop();
        listener.start(0, tx).await.unwrap();
        listener.stop();
        listener.stop();
        assert!(!listener.is_running());
        assert_eq!(listener.local_addr(), None);
    }

    #[tokio::test]
    async fn test_restart_on_same_port_right_after_stop() {
        // Arrange
        let (tx, _rx) = mpsc::channel(8);
        let mut listener = RendezvousListener::new();
        let first = listener.start(0, tx.clone()).await.unwrap();

        // Act: no yield between stop and start
        listener.stop();
        let second = listener.start(first.port(), tx).await;

        // Assert
        assert_eq!(second.expect("port must be free again").port(), first.port());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        // Arrange: occupy a port first
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let (tx, _rx) = mpsc::channel(8);
        let mut listener = RendezvousListener::new();

        // Act
        let result = listener.start(port, tx).await;

        // Assert
        assert!(matches!(result, Err(NetworkError::BindFailed { .. })));
        assert!(!listener.is_running());
    }
}
