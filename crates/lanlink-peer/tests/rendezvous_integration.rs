//! End-to-end rendezvous tests over loopback.
//!
//! Each peer binds an ephemeral discovery port and broadcasts to 127.0.0.1,
//! so it only ever hears its own (filtered) echo.  Discovery of the other
//! peer is injected through `PeerHandle::dispatch`, exactly as the receive
//! loop would publish it.  Everything after that (dial, accept, the first-wins
//! transition, the chat relay) runs over real TCP sockets.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use lanlink_core::Identity;
use lanlink_peer::infrastructure::storage::config::SessionClosedPolicy;
use lanlink_peer::{
    ChannelNotifier, PeerEvent, PeerHandle, RendezvousConfig, RendezvousService, UiEvent,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(5);

struct TestPeer {
    handle: PeerHandle,
    ui: UnboundedReceiver<UiEvent>,
    listen_addr: SocketAddr,
    task: JoinHandle<()>,
}

fn loopback_config(policy: SessionClosedPolicy) -> RendezvousConfig {
    let mut config = RendezvousConfig::default();
    config.discovery.port = 0;
    config.discovery.broadcast_address = Ipv4Addr::LOCALHOST;
    config.on_session_closed = policy;
    config
}

async fn spawn_peer(policy: SessionClosedPolicy) -> TestPeer {
    let (notifier, ui) = ChannelNotifier::new();
    let identity = Identity::new(Ipv4Addr::LOCALHOST, 0);
    let (mut service, handle) =
        RendezvousService::new(loopback_config(policy), identity, Arc::new(notifier));
    service.start().await;
    let port = service.listen_addr().expect("listener bound").port();
    TestPeer {
        handle,
        ui,
        listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
        task: tokio::spawn(service.run()),
    }
}

/// Reads UI events until `pred` matches one; returns everything seen.
async fn wait_for(ui: &mut UnboundedReceiver<UiEvent>, pred: impl Fn(&UiEvent) -> bool) -> Vec<UiEvent> {
    let mut seen = Vec::new();
    let result = timeout(WAIT, async {
        while let Some(event) = ui.recv().await {
            let done = pred(&event);
            seen.push(event);
            if done {
                return;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out; saw {seen:?}");
    seen
}

fn drain(ui: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = ui.try_recv() {
        seen.push(event);
    }
    seen
}

fn statuses(events: &[UiEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Status(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

async fn shutdown(peer: TestPeer) {
    assert_ok!(peer.handle.shutdown().await);
    assert_ok!(timeout(WAIT, peer.task).await.expect("service stops"));
}

/// Makes `b` discover `a`, then waits until both report the connection.
async fn rendezvous(a: &mut TestPeer, b: &mut TestPeer) -> (Vec<UiEvent>, Vec<UiEvent>) {
    assert_ok!(
        b.handle
            .dispatch(PeerEvent::DiscoveryReceived {
                round: 1,
                peer: a.listen_addr,
            })
            .await
    );
    let seen_b = wait_for(&mut b.ui, |e| matches!(e, UiEvent::PeerConnected(_))).await;
    let seen_a = wait_for(&mut a.ui, |e| matches!(e, UiEvent::PeerConnected(_))).await;
    (seen_a, seen_b)
}

#[tokio::test]
async fn test_two_peers_rendezvous_and_relay_chat() {
    // Arrange
    let mut a = spawn_peer(SessionClosedPolicy::StayIdle).await;
    let mut b = spawn_peer(SessionClosedPolicy::StayIdle).await;

    // Act
    let (seen_a, seen_b) = rendezvous(&mut a, &mut b).await;

    // Assert: both sides connected to each other, no timeout prompt
    let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
    assert!(seen_a.contains(&UiEvent::PeerConnected(localhost)));
    assert!(seen_b.contains(&UiEvent::PeerConnected(localhost)));
    assert!(statuses(&seen_a).contains(&"Connected".to_string()));
    assert!(statuses(&seen_b).contains(&"Connected".to_string()));
    assert!(!seen_a.contains(&UiEvent::SearchTimedOut));
    assert!(!seen_b.contains(&UiEvent::SearchTimedOut));

    // Act: A sends a chat line
    assert_ok!(a.handle.send_message("hi").await);

    // Assert: B receives it, A sees its own echo
    let is_hi = |e: &UiEvent| matches!(e, UiEvent::Message(m) if m.starts_with("[127.0.0.1][") && m.ends_with("] hi"));
    let got_b = wait_for(&mut b.ui, is_hi).await;
    let got_a = wait_for(&mut a.ui, is_hi).await;
    assert_eq!(got_a.last(), got_b.last(), "both sides render the same line");

    shutdown(a).await;
    shutdown(b).await;
}

#[tokio::test]
async fn test_connect_failure_offers_retry() {
    // Arrange: a port nobody listens on
    let mut a = spawn_peer(SessionClosedPolicy::StayIdle).await;
    let refused = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };

    // Act
    assert_ok!(
        a.handle
            .dispatch(PeerEvent::DiscoveryReceived { round: 1, peer: refused })
            .await
    );
    let seen = wait_for(&mut a.ui, |e| *e == UiEvent::SearchTimedOut).await;

    // Assert
    let status = statuses(&seen);
    assert!(status.iter().any(|s| s.starts_with(&format!("Connection to {refused} failed"))));
    assert_eq!(status.last().map(String::as_str), Some("Timeout"));

    shutdown(a).await;
}

#[tokio::test]
async fn test_resume_search_after_peer_leaves() {
    // Arrange
    let mut a = spawn_peer(SessionClosedPolicy::ResumeSearch).await;
    let mut b = spawn_peer(SessionClosedPolicy::StayIdle).await;
    rendezvous(&mut a, &mut b).await;

    // Act
    shutdown(b).await;

    // Assert
    let seen = wait_for(&mut a.ui, |e| *e == UiEvent::Status("Searching... (11s)".into())).await;
    assert!(statuses(&seen).contains(&"Disconnected".to_string()));

    shutdown(a).await;
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_retry_restarts_countdown() {
    // Arrange
    let mut a = spawn_peer(SessionClosedPolicy::StayIdle).await;

    // Act: let the whole search window pass
    tokio::time::sleep(Duration::from_millis(11_500)).await;
    let first_round = drain(&mut a.ui);

    // Assert: full countdown, one timeout prompt
    let timeouts = first_round
        .iter()
        .filter(|e| **e == UiEvent::SearchTimedOut)
        .count();
    assert_eq!(timeouts, 1);
    let status = statuses(&first_round);
    assert_eq!(status.first().map(String::as_str), Some("Searching... (11s)"));
    assert!(status.contains(&"Searching... (1s)".to_string()));
    assert!(!status.contains(&"Searching... (0s)".to_string()));
    assert_eq!(status.last().map(String::as_str), Some("Timeout"));

    // Act: retry and watch one tick
    assert_ok!(a.handle.retry().await);
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    // Assert: fresh countdown, no leftovers from the first round
    assert_eq!(
        statuses(&drain(&mut a.ui)),
        vec!["Searching... (11s)".to_string(), "Searching... (10s)".to_string()]
    );

    shutdown(a).await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_timeout_goes_idle() {
    // Arrange
    let mut a = spawn_peer(SessionClosedPolicy::StayIdle).await;
    tokio::time::sleep(Duration::from_millis(11_500)).await;
    drain(&mut a.ui);

    // Act
    assert_ok!(a.handle.cancel().await);
    tokio::time::sleep(Duration::from_millis(3_000)).await;

    // Assert: nothing runs after cancel
    assert_eq!(drain(&mut a.ui), vec![UiEvent::Status("Idle".into())]);

    shutdown(a).await;
}
