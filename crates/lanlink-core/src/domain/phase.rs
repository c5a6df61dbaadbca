//! Rendezvous phase state machine.
//!
//! # Phase lifecycle (for beginners)
//!
//! ```text
//!          begin_search            try_connect
//!   Idle ───────────────► Searching ───────────► Connected
//!    ▲                       │                       │
//!    │ cancel                │ time_out              │ disconnect
//!    │                       ▼                       ▼
//!    └────────────────── TimedOut                  Idle
//!                            │
//!                            └── begin_search (retry) ──► Searching
//! ```
//!
//! - `Idle`: nothing is running.
//! - `Searching`: the listener is open, announcements go out every two
//!   seconds, the countdown ticks.
//! - `Connected`: a session was established; discovery is torn down.
//! - `TimedOut`: the search window elapsed; the user is asked to retry.
//!
//! # Rounds
//!
//! Each call to [`RendezvousState::begin_search`] starts a new *round*.  Timer
//! and discovery events are tagged with the round that spawned them, and the
//! state rejects anything from an older round.  A countdown tick that was
//! already queued when the user pressed "retry" therefore cannot decrement the
//! new round's countdown.
//!
//! # First wins
//!
//! The listener and the connector race to produce the first session.  Both
//! paths call [`RendezvousState::try_connect`]; exactly one of them sees
//! `true`.  The loser's session is still kept by the caller, but it must not
//! repeat the "connected" side effects.

/// Discovery round number.  Starts at 0 (no round yet) and only grows.
pub type Round = u64;

/// Current phase of the rendezvous protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    Connected,
    TimedOut,
}

impl Phase {
    /// Short human-readable label, used in status lines and logs.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Searching => "Searching",
            Phase::Connected => "Connected",
            Phase::TimedOut => "Timeout",
        }
    }
}

/// Observational countdown shown while searching.
///
/// It has no effect on protocol correctness; the search timeout is a separate
/// timer.  The countdown only reports values above zero, so the last visible
/// status before the timeout fires is `Searching... (1s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    start: u32,
    remaining: u32,
}

impl Countdown {
    pub fn new(start: u32) -> Self {
        Self {
            start,
            remaining: start,
        }
    }

    /// Seconds left.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Restores the starting value.
    pub fn reset(&mut self) {
        self.remaining = self.start;
    }

    /// Decrements by one; returns the new value when it should be displayed.
    pub fn tick(&mut self) -> Option<u32> {
        self.remaining = self.remaining.saturating_sub(1);
        (self.remaining > 0).then_some(self.remaining)
    }
}

/// The rendezvous state: phase, round, and countdown.
///
/// Owned by exactly one task.  None of the methods perform I/O; each returns
/// whether the transition happened so the caller can run side effects only
/// when it did.
#[derive(Debug, Clone)]
pub struct RendezvousState {
    phase: Phase,
    round: Round,
    countdown: Countdown,
    discovery_claimed: bool,
}

impl RendezvousState {
    /// Creates an `Idle` state whose countdown starts at `countdown_start`.
    pub fn new(countdown_start: u32) -> Self {
        Self {
            phase: Phase::Idle,
            round: 0,
            countdown: Countdown::new(countdown_start),
            discovery_claimed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    /// `true` while searching in exactly `round`.
    pub fn is_searching_in(&self, round: Round) -> bool {
        self.phase == Phase::Searching && self.round == round
    }

    /// Starts a new discovery round from `Idle` or `TimedOut`.
    ///
    /// Resets the countdown and returns the new round number, or `None` when a
    /// round is already running or a session is connected.
    pub fn begin_search(&mut self) -> Option<Round> {
        match self.phase {
            Phase::Idle | Phase::TimedOut => {
                self.round += 1;
                self.phase = Phase::Searching;
                self.countdown.reset();
                self.discovery_claimed = false;
                Some(self.round)
            }
            Phase::Searching | Phase::Connected => None,
        }
    }

    /// Claims the one discovery a round is allowed to act on.
    ///
    /// Announcements keep arriving every two seconds and several may already
    /// be queued when the first one is handled.  Only the first call of a
    /// searching round returns `true`; the caller dials that peer and ignores
    /// the rest.
    pub fn claim_discovery(&mut self, round: Round) -> bool {
        if self.is_searching_in(round) && !self.discovery_claimed {
            self.discovery_claimed = true;
            true
        } else {
            false
        }
    }

    /// `true` when the current round already acted on a discovery.
    pub fn discovery_claimed(&self) -> bool {
        self.discovery_claimed
    }

    /// The single check-and-set guarding `Searching -> Connected`.
    ///
    /// Returns `true` for the first caller of a round and `false` for every
    /// caller after it.
    pub fn try_connect(&mut self) -> bool {
        if self.phase == Phase::Searching {
            self.phase = Phase::Connected;
            true
        } else {
            false
        }
    }

    /// Applies a countdown tick from `round`.
    ///
    /// Returns the value to display, or `None` when the tick is stale, the
    /// phase is no longer `Searching`, or the countdown reached zero.
    pub fn tick(&mut self, round: Round) -> Option<u32> {
        if !self.is_searching_in(round) {
            return None;
        }
        self.countdown.tick()
    }

    /// Applies the search timeout from `round`.
    ///
    /// Returns `true` when the state moved to `TimedOut`.
    pub fn time_out(&mut self, round: Round) -> bool {
        if self.is_searching_in(round) {
            self.phase = Phase::TimedOut;
            true
        } else {
            false
        }
    }

    /// Declines a retry after a timeout.  Returns `true` when the state moved
    /// from `TimedOut` to `Idle`.
    pub fn cancel(&mut self) -> bool {
        if self.phase == Phase::TimedOut {
            self.phase = Phase::Idle;
            true
        } else {
            false
        }
    }

    /// Leaves `Connected` after the last session closed.
    pub fn disconnect(&mut self) -> bool {
        if self.phase == Phase::Connected {
            self.phase = Phase::Idle;
            true
        } else {
            false
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
