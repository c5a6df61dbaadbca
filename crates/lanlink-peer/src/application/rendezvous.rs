//! RendezvousService: the single task that owns the peer's state.
//!
//! # The race it arbitrates (for beginners)
//!
//! Both peers broadcast and both listen.  When peer A hears B's `HELLO`, A
//! dials B.  At almost the same moment B may hear A's `HELLO` and dial A.  Each
//! peer can therefore see an inbound accept *and* an outbound dial success in
//! the same round, in either order.
//!
//! The service resolves this with one rule: whichever path reaches
//! [`RendezvousState::try_connect`] first moves the phase to `Connected`,
//! stops discovery, and notifies the UI.  The other path still registers its
//! session (so no socket is leaked and no data is lost) but reports nothing.
//!
//! # Event flow
//!
//! ```text
//! listener ──ConnectionAccepted──┐
//! discovery ─DiscoveryReceived──┤
//! timers ────TimerFired─────────┤
//! connector ─ConnectDone────────┼──► mpsc ──► RendezvousService::handle_event
//! sessions ──DataReceived───────┤                     │
//!            PeerClosed─────────┤                     ▼
//! PeerHandle ─SendMessage/...───┘              SessionNotifier
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use lanlink_core::{
    format_chat_line, Identity, Phase, RendezvousState, Round, SessionId, SessionInfo,
    SessionOrigin,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::events::{PeerEvent, PeerHandle, TimerKind};
use crate::infrastructure::network::connector::PeerConnector;
use crate::infrastructure::network::discovery::{DiscoveryBroadcaster, DiscoverySettings};
use crate::infrastructure::network::listener::RendezvousListener;
use crate::infrastructure::network::session::{spawn_session, SessionHandle};
use crate::infrastructure::network::NetworkError;
use crate::infrastructure::storage::config::{AppConfig, SessionClosedPolicy};
use crate::infrastructure::ui_bridge::SessionNotifier;

/// Capacity of the service's event queue.
const EVENT_QUEUE: usize = 256;

/// Runtime parameters of the service, derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct RendezvousConfig {
    pub discovery: DiscoverySettings,
    pub connect_timeout: Duration,
    pub countdown_start: u32,
    pub on_session_closed: SessionClosedPolicy,
}

impl RendezvousConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            discovery: DiscoverySettings {
                port: config.network.discovery_port,
                broadcast_address: config.network.broadcast_address,
                broadcast_interval: config.timing.broadcast_interval(),
                countdown_tick: config.timing.countdown_tick(),
                search_timeout: config.timing.search_timeout(),
            },
            connect_timeout: config.timing.connect_timeout(),
            countdown_start: config.timing.countdown_start_secs,
            on_session_closed: config.peer.on_session_closed,
        }
    }
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

fn searching_status(secs: u32) -> String {
    format!("Searching... ({secs}s)")
}

/// Owns the phase, the round, the session set, and every transport.
pub struct RendezvousService {
    identity: Identity,
    state: RendezvousState,
    sessions: HashMap<SessionId, SessionHandle>,
    listener: RendezvousListener,
    discovery: DiscoveryBroadcaster,
    connector: PeerConnector,
    notifier: Arc<dyn SessionNotifier>,
    on_session_closed: SessionClosedPolicy,
    events_tx: mpsc::Sender<PeerEvent>,
    events_rx: mpsc::Receiver<PeerEvent>,
}

impl RendezvousService {
    /// Creates an idle service and the handle used to command it.
    ///
    /// Nothing is bound until [`start`](Self::start) or [`run`](Self::run).
    pub fn new(
        config: RendezvousConfig,
        identity: Identity,
        notifier: Arc<dyn SessionNotifier>,
    ) -> (Self, PeerHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let handle = PeerHandle::new(events_tx.clone());
        let service = Self {
            identity,
            state: RendezvousState::new(config.countdown_start),
            sessions: HashMap::new(),
            listener: RendezvousListener::new(),
            discovery: DiscoveryBroadcaster::new(config.discovery),
            connector: PeerConnector::new(config.connect_timeout),
            notifier,
            on_session_closed: config.on_session_closed,
            events_tx,
            events_rx,
        };
        (service, handle)
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The local identity.  Its port reflects the bound listener once the
    /// first round has started.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Address of the rendezvous listener while it is open.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn is_discovering(&self) -> bool {
        self.discovery.is_running()
    }

    /// Starts the first discovery round.  Does nothing if a round has already
    /// been started.
    pub async fn start(&mut self) {
        if self.state.round() == 0 {
            self.begin_round().await;
        }
    }

    /// Processes events until [`PeerHandle::shutdown`] is called, then closes
    /// every socket.
    pub async fn run(mut self) {
        self.start().await;
        info!("rendezvous service running as {}", self.identity);

        while let Some(event) = self.events_rx.recv().await {
            if self.handle_event(event).await.is_break() {
                break;
            }
        }

        self.teardown();
    }

    /// Applies one event.  Returns `Break` on shutdown.
    pub async fn handle_event(&mut self, event: PeerEvent) -> ControlFlow<()> {
        match event {
            PeerEvent::DiscoveryReceived { round, peer } => self.on_discovery(round, peer),
            PeerEvent::ConnectionAccepted { stream, remote } => self.on_accepted(stream, remote),
            PeerEvent::ConnectDone {
                round,
                remote,
                result,
            } => self.on_connect_done(round, remote, result),
            PeerEvent::TimerFired { round, timer } => self.on_timer(round, timer),
            PeerEvent::DataReceived { session, text } => {
                if self.sessions.contains_key(&session) {
                    self.notifier.on_message(&text);
                } else {
                    trace!("data from pruned session {session} dropped");
                }
            }
            PeerEvent::PeerClosed { session } => self.on_peer_closed(session).await,
            PeerEvent::SendMessage(text) => self.relay(&text).await,
            PeerEvent::Retry => {
                if !self.begin_round().await {
                    debug!("retry ignored in phase {}", self.state.phase().label());
                }
            }
            PeerEvent::Cancel => {
                if self.state.cancel() {
                    info!("search cancelled");
                    self.notifier.on_status_update(Phase::Idle.label());
                }
            }
            PeerEvent::Shutdown => {
                info!("shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Starts a new round: listener, then discovery.  Returns `false` when the
    /// phase does not allow a new round.
    async fn begin_round(&mut self) -> bool {
        let Some(round) = self.state.begin_search() else {
            return false;
        };
        self.notifier
            .on_status_update(&searching_status(self.state.countdown().remaining()));

        match self
            .listener
            .start(self.identity.port, self.events_tx.clone())
            .await
        {
            Ok(addr) => {
                // Port 0 asks the OS for a port; advertise the one we got.
                self.identity.port = addr.port();
            }
            Err(e) => {
                warn!("rendezvous listener unavailable: {e}");
                self.notifier
                    .on_status_update(&format!("Listener unavailable: {e}"));
            }
        }

        if let Err(e) = self
            .discovery
            .start(self.identity, round, self.events_tx.clone())
            .await
        {
            warn!("discovery unavailable: {e}");
            self.notifier
                .on_status_update(&format!("Discovery unavailable: {e}"));
        }

        info!("discovery round {round} started");
        true
    }

    fn on_discovery(&mut self, round: Round, peer: SocketAddr) {
        if !self.state.claim_discovery(round) {
            trace!("announcement from {peer} ignored (round {round})");
            return;
        }
        info!("discovered peer at {peer}; dialing");
        self.discovery.stop();
        self.connector.connect(peer, round, self.events_tx.clone());
    }

    /// New sessions are only taken while searching or already connected.
    fn accepts_sessions(&self) -> bool {
        matches!(self.state.phase(), Phase::Searching | Phase::Connected)
    }

    fn on_accepted(&mut self, stream: TcpStream, remote: SocketAddr) {
        if !self.accepts_sessions() {
            debug!("late inbound connection from {remote} dropped");
            return;
        }
        self.register(stream, remote, SessionOrigin::Inbound);
        if self.state.try_connect() {
            self.on_connected(remote);
        }
    }

    fn on_connect_done(
        &mut self,
        round: Round,
        remote: SocketAddr,
        result: std::io::Result<TcpStream>,
    ) {
        let current = round == self.state.round();
        match result {
            Ok(stream) if current && self.accepts_sessions() => {
                self.register(stream, remote, SessionOrigin::Outbound);
                if self.state.try_connect() {
                    self.on_connected(remote);
                }
            }
            Ok(_) => debug!("dial to {remote} finished after round {round}; dropped"),
            Err(e) if self.state.is_searching_in(round) => {
                warn!("connection to {remote} failed: {e}");
                self.notifier
                    .on_status_update(&format!("Connection to {remote} failed: {e}"));
                if self.state.time_out(round) {
                    self.enter_timed_out();
                }
            }
            Err(e) => debug!("stale dial failure to {remote}: {e}"),
        }
    }

    fn on_timer(&mut self, round: Round, timer: TimerKind) {
        match timer {
            TimerKind::CountdownTick => {
                if let Some(secs) = self.state.tick(round) {
                    self.notifier.on_status_update(&searching_status(secs));
                }
            }
            TimerKind::SearchTimeout => {
                if self.state.time_out(round) {
                    info!("discovery round {round} timed out");
                    self.enter_timed_out();
                } else {
                    trace!("stale timeout from round {round}");
                }
            }
        }
    }

    async fn on_peer_closed(&mut self, session: SessionId) {
        let Some(handle) = self.sessions.remove(&session) else {
            return;
        };
        info!("session {session} with {} closed", handle.info().remote);
        drop(handle);
        self.after_session_removed().await;
    }

    /// Leaves `Connected` once the session set is empty, then applies the
    /// configured [`SessionClosedPolicy`].
    async fn after_session_removed(&mut self) {
        if !self.sessions.is_empty() || !self.state.disconnect() {
            return;
        }
        self.listener.stop();
        self.notifier.on_status_update("Disconnected");
        if self.on_session_closed == SessionClosedPolicy::ResumeSearch {
            self.begin_round().await;
        }
    }

    fn on_connected(&mut self, remote: SocketAddr) {
        info!("connected to {remote} in round {}", self.state.round());
        self.discovery.stop();
        self.notifier.on_status_update(Phase::Connected.label());
        self.notifier.on_peer_connected(remote.ip());
    }

    fn enter_timed_out(&mut self) {
        self.discovery.stop();
        self.listener.stop();
        self.notifier.on_status_update(Phase::TimedOut.label());
        self.notifier.on_search_timeout();
    }

    fn register(&mut self, stream: TcpStream, remote: SocketAddr, origin: SessionOrigin) {
        let info = SessionInfo::new(remote, origin);
        debug!("session {} with {remote} ({origin:?})", info.id);
        let handle = spawn_session(stream, info, self.events_tx.clone());
        self.sessions.insert(handle.info().id, handle);
    }

    /// Writes the formatted line to every session, prunes the ones whose
    /// writer is gone, then echoes the line locally.
    ///
    /// A session with a full outbound queue misses this line but stays open.
    async fn relay(&mut self, text: &str) {
        let line = format_chat_line(self.identity.address, Local::now().time(), text);

        let mut closed = Vec::new();
        for (id, handle) in &self.sessions {
            match handle.send(line.as_bytes()) {
                Ok(()) => {}
                Err(NetworkError::SessionBusy(_)) => {
                    warn!("session {id} is not keeping up; line dropped for it");
                }
                Err(e) => {
                    warn!("{e}; removing it");
                    closed.push(*id);
                }
            }
        }
        for id in &closed {
            self.sessions.remove(id);
        }

        self.notifier.on_message(&line);

        if !closed.is_empty() {
            self.after_session_removed().await;
        }
    }

    fn teardown(&mut self) {
        self.discovery.stop();
        self.listener.stop();
        self.sessions.clear();
        info!("rendezvous service stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
