//! Bridge from the rendezvous service to whatever front end shows it.
//!
//! The service never prints anything itself.  It calls a [`SessionNotifier`]
//! for the four things a user needs to see: status changes, a new peer, a chat
//! line, and the "search timed out, retry?" prompt.  The user's answers go
//! back through the `PeerHandle` commands, not through this trait.
//!
//! # Why a channel? (for beginners)
//!
//! Notifier calls are made from inside the service task while it is in the
//! middle of processing an event.  A front end that did slow work there (for
//! example, blocking on stdin for the retry answer) would stall every socket
//! and timer.  [`ChannelNotifier`] just pushes a [`UiEvent`] onto an unbounded
//! queue and returns; the front end drains the queue at its own pace.

use std::net::IpAddr;

use tokio::sync::mpsc;

/// Sink for user-visible notifications.
///
/// Implementations must return quickly and must not call back into the
/// service.
#[cfg_attr(test, mockall::automock)]
pub trait SessionNotifier: Send + Sync {
    /// A new status line such as `Searching... (9s)` or `Connected`.
    fn on_status_update(&self, status: &str);

    /// The first session of a round was established with `peer`.
    fn on_peer_connected(&self, peer: IpAddr);

    /// A chat line to display, received or echoed locally.
    fn on_message(&self, line: &str);

    /// The search window elapsed.  The front end should offer a retry.
    fn on_search_timeout(&self);
}

/// One notification, as delivered by [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Status(String),
    PeerConnected(IpAddr),
    Message(String),
    SearchTimedOut,
}

/// [`SessionNotifier`] that forwards every call onto an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiver the front end reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, event: UiEvent) {
        // A closed receiver means the front end has exited.
        let _ = self.tx.send(event);
    }
}

impl SessionNotifier for ChannelNotifier {
    fn on_status_update(&self, status: &str) {
        self.push(UiEvent::Status(status.to_string()));
    }

    fn on_peer_connected(&self, peer: IpAddr) {
        self.push(UiEvent::PeerConnected(peer));
    }

    fn on_message(&self, line: &str) {
        self.push(UiEvent::Message(line.to_string()));
    }

    fn on_search_timeout(&self) {
        self.push(UiEvent::SearchTimedOut);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_preserves_call_order() {
        // Arrange
        let (notifier, mut rx) = ChannelNotifier::new();
        let peer: IpAddr = "192.168.1.30".parse().unwrap();

        // Act
        notifier.on_status_update("Connected");
        notifier.on_peer_connected(peer);
        notifier.on_message("[192.168.1.30][10:00:00] hi");
        notifier.on_search_timeout();

        // Assert
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Status("Connected".into()));
        assert_eq!(rx.try_recv().unwrap(), UiEvent::PeerConnected(peer));
        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Message("[192.168.1.30][10:00:00] hi".into())
        );
        assert_eq!(rx.try_recv().unwrap(), UiEvent::SearchTimedOut);
    }

    #[test]
    fn test_channel_notifier_survives_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.on_status_update("Idle");
    }
}
