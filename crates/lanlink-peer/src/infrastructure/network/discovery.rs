//! UDP discovery broadcaster.
//!
//! # How peers find each other (for beginners)
//!
//! While a search round is running, every peer does four things at once:
//!
//! 1. **Announce**: every two seconds it broadcasts `HELLO:<session_port>` to
//!    `255.255.255.255:41234`.
//! 2. **Listen**: it receives every datagram on port 41234, drops its own
//!    echoes and anything that is not a valid `HELLO`, and reports the rest
//!    to the service as [`PeerEvent::DiscoveryReceived`].
//! 3. **Count down**: once a second it emits a countdown tick.
//! 4. **Time out**: after eleven seconds it emits the search timeout.
//!
//! All four are separate tokio tasks tagged with the round number.  They hold
//! no state of their own beyond their socket or timer; the service decides what
//! each event means.  [`DiscoveryBroadcaster::stop`] aborts all of them.
//!
//! The timers are spawned *before* the UDP socket is bound.  If the bind
//! fails, the round still counts down and times out, so the user ends up at
//! the retry prompt rather than in a silent search that never ends.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use lanlink_core::{Announcement, Identity, Round};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, trace};

use super::NetworkError;
use crate::application::events::{PeerEvent, TimerKind};

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Discovery socket and timer parameters.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// UDP port to bind and broadcast to.  0 binds an ephemeral port and
    /// broadcasts to whatever port was bound.
    pub port: u16,
    pub broadcast_address: Ipv4Addr,
    pub broadcast_interval: Duration,
    pub countdown_tick: Duration,
    pub search_timeout: Duration,
}

/// Runs the broadcast, receive, countdown, and timeout tasks of one round.
#[derive(Debug)]
pub struct DiscoveryBroadcaster {
    settings: DiscoverySettings,
    tasks: Vec<JoinHandle<()>>,
    /// Aborted tasks of the last stopped round, awaited before rebinding.
    /// Holds at most one round's handles.
    retired: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl DiscoveryBroadcaster {
    pub fn new(settings: DiscoverySettings) -> Self {
        Self {
            settings,
            tasks: Vec::new(),
            retired: Vec::new(),
            local_addr: None,
        }
    }

    /// Starts a round.  Any previous round's tasks are aborted first.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] when the discovery socket cannot be
    /// bound.  The countdown and timeout tasks are already running in that
    /// case and keep running until [`stop`](Self::stop).
    pub async fn start(
        &mut self,
        local: Identity,
        round: Round,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<(), NetworkError> {
        self.stop();
        for previous in std::mem::take(&mut self.retired) {
            let _ = previous.await;
        }

        self.tasks.push(tokio::spawn(countdown_loop(
            self.settings.countdown_tick,
            round,
            events.clone(),
        )));
        self.tasks.push(tokio::spawn(timeout_once(
            self.settings.search_timeout,
            round,
            events.clone(),
        )));

        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.settings.port));
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| NetworkError::BindFailed {
                addr: bind_addr,
                source,
            })?;
        socket.set_broadcast(true)?;
        let bound = socket.local_addr()?;
        let bound_port = bound.port();
        let socket = Arc::new(socket);

        let target = SocketAddr::from((self.settings.broadcast_address, bound_port));
        let payload = local.announcement().encode();

        self.tasks.push(tokio::spawn(broadcast_loop(
            Arc::clone(&socket),
            target,
            payload,
            self.settings.broadcast_interval,
        )));
        self.tasks
            .push(tokio::spawn(receive_loop(socket, local, round, events)));

        self.local_addr = Some(bound);
        info!("discovery round {round} on UDP {bound}, announcing to {target}");
        Ok(())
    }

    /// Aborts every task of the current round.  Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.local_addr = None;
        if self.tasks.is_empty() {
            return;
        }
        self.retired.retain(|task| !task.is_finished());
        for task in self.tasks.drain(..) {
            task.abort();
            self.retired.push(task);
        }
        debug!("discovery stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Bound discovery socket while a round is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for DiscoveryBroadcaster {
    fn drop(&mut self) {
        for task in self.tasks.iter().chain(self.retired.iter()) {
            task.abort();
        }
    }
}

/// Returns the session address to dial when `datagram` from `from` is a
/// valid announcement from some other peer.
pub fn filter_datagram(datagram: &[u8], from: SocketAddr, local: &Identity) -> Option<SocketAddr> {
    let announcement = match Announcement::parse(datagram) {
        Ok(a) => a,
        Err(e) => {
            trace!("dropping datagram from {from}: {e}");
            return None;
        }
    };

    // Announcements are IPv4-only; an IPv6 source cannot be a peer.
    let sender = match from.ip() {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => return None,
    };

    if announcement.is_echo_of(IpAddr::V4(sender), local) {
        trace!("dropping own announcement");
        return None;
    }

    Some(SocketAddr::from((sender, announcement.port)))
}

async fn broadcast_loop(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    payload: Vec<u8>,
    every: Duration,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    loop {
        ticker.tick().await;
        if let Err(e) = socket.send_to(&payload, target).await {
            debug!("announcement to {target} failed: {e}");
        }
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    local: Identity,
    round: Round,
    events: mpsc::Sender<PeerEvent>,
) {
    let mut buf = [0u8; 1024];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let Some(peer) = filter_datagram(&buf[..len], from, &local) else {
                    continue;
                };
                debug!("peer announced at {peer}");
                if events
                    .send(PeerEvent::DiscoveryReceived { round, peer })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                debug!("discovery receive failed: {e}");
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }
}

async fn countdown_loop(every: Duration, round: Round, events: mpsc::Sender<PeerEvent>) {
    let mut ticker = interval_at(Instant::now() + every, every);
    loop {
        ticker.tick().await;
        let fired = PeerEvent::TimerFired {
            round,
            timer: TimerKind::CountdownTick,
        };
        if events.send(fired).await.is_err() {
            break;
        }
    }
}

async fn timeout_once(after: Duration, round: Round, events: mpsc::Sender<PeerEvent>) {
    tokio::time::sleep(after).await;
    let _ = events
        .send(PeerEvent::TimerFired {
            round,
            timer: TimerKind::SearchTimeout,
        })
        .await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> Identity {
        Identity::new(Ipv4Addr::new(10, 0, 0, 5), 40100)
    }

    fn settings() -> DiscoverySettings {
        DiscoverySettings {
            port: 0,
            broadcast_address: Ipv4Addr::LOCALHOST,
            broadcast_interval: Duration::from_secs(2),
            countdown_tick: Duration::from_secs(1),
            search_timeout: Duration::from_secs(11),
        }
    }

    #[test]
    fn test_filter_datagram_returns_dial_address_for_foreign_hello() {
        // Arrange
        let from: SocketAddr = "10.0.0.9:41234".parse().unwrap();

        // Act
        let peer = filter_datagram(b"HELLO:40777", from, &me());

        // Assert: source IP with the advertised port, not the UDP source port
        assert_eq!(peer, Some("10.0.0.9:40777".parse().unwrap()));
    }

    #[test]
    fn test_filter_datagram_drops_own_echo() {
        let from: SocketAddr = "10.0.0.5:41234".parse().unwrap();
        assert_eq!(filter_datagram(b"HELLO:40100", from, &me()), None);
    }

    #[test]
    fn test_filter_datagram_keeps_same_host_other_port() {
        let from: SocketAddr = "10.0.0.5:41234".parse().unwrap();
        assert_eq!(
            filter_datagram(b"HELLO:40200", from, &me()),
            Some("10.0.0.5:40200".parse().unwrap())
        );
    }

    #[test]
    fn test_filter_datagram_drops_noise_and_ipv6() {
        let v4: SocketAddr = "10.0.0.9:41234".parse().unwrap();
        let v6: SocketAddr = "[fe80::1]:41234".parse().unwrap();
        assert_eq!(filter_datagram(b"M-SEARCH * HTTP/1.1", v4, &me()), None);
        assert_eq!(filter_datagram(b"HELLO:40777", v6, &me()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_emits_ticks_then_single_timeout() {
        // Arrange
        let (tx, mut rx) = mpsc::channel(64);
        let mut discovery = DiscoveryBroadcaster::new(settings());

        // Act
        discovery.start(me(), 7, tx).await.expect("bind ephemeral UDP port");
        tokio::time::sleep(Duration::from_millis(11_500)).await;
        discovery.stop();

        // Assert
        let mut ticks = 0;
        let mut timeouts = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                PeerEvent::TimerFired { round: 7, timer: TimerKind::CountdownTick } => ticks += 1,
                PeerEvent::TimerFired { round: 7, timer: TimerKind::SearchTimeout } => timeouts += 1,
                _ => {}
            }
        }
        assert_eq!(ticks, 11);
        assert_eq!(timeouts, 1);
    }

    #[tokio::test]
    async fn test_received_hello_is_published_with_round() {
        // Arrange
        let local = Identity::new(Ipv4Addr::LOCALHOST, 40100);
        let (tx, mut rx) = mpsc::channel(64);
        let mut discovery = DiscoveryBroadcaster::new(settings());
        discovery.start(local, 4, tx).await.unwrap();
        let port = discovery.local_addr().expect("socket bound").port();
        let target = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // Act: noise and our own echo first, then a real peer
        sender.send_to(b"NOTIFY * HTTP/1.1", target).await.unwrap();
        sender.send_to(b"HELLO:40100", target).await.unwrap();
        sender.send_to(b"HELLO:40555", target).await.unwrap();

        // Assert: exactly one discovery, for the foreign peer
        let mut found = Vec::new();
        let deadline = Instant::now() + Duration::from_millis(500);
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
            if let PeerEvent::DiscoveryReceived { round, peer } = event {
                found.push((round, peer));
            }
        }
        assert_eq!(found, vec![(4, "127.0.0.1:40555".parse().unwrap())]);
    }

    #[tokio::test]
    async fn test_stop_aborts_all_tasks() {
        let (tx, _rx) = mpsc::channel(8);
        let mut discovery = DiscoveryBroadcaster::new(settings());
        discovery.start(me(), 1, tx.clone()).await.unwrap();
        discovery.stop();
        discovery.start(me(), 2, tx).await.unwrap();
        assert!(discovery.is_running());

        discovery.stop();
        discovery.stop();

        assert!(!discovery.is_running());
        assert_eq!(discovery.local_addr(), None);
        assert!(discovery.retired.len() <= 4, "one round of handles at most");
    }
}
