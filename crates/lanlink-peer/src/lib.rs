//! lanlink-peer library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does a peer do? (for beginners)
//!
//! A peer is one side of a LanLink chat.  Two peers started on the same LAN
//! find each other without being told any address:
//!
//! 1. Each opens a TCP listener on a random port and broadcasts
//!    `HELLO:<port>` over UDP every two seconds.
//! 2. The first peer to hear a foreign announcement dials it.  The other side
//!    accepts.  Whichever connection lands first wins; discovery stops.
//! 3. From then on every line the user types is stamped
//!    `[<ip>][<HH:MM:SS>]` and written to the session.
//! 4. If nobody answers within eleven seconds, the user is asked whether to
//!    search again.

/// Application layer: the rendezvous service and its events.
pub mod application;

/// Infrastructure layer: network transports, config storage, and UI bridge.
pub mod infrastructure;

pub use application::events::{PeerEvent, PeerHandle, ServiceStopped, TimerKind};
pub use application::rendezvous::{RendezvousConfig, RendezvousService};
pub use infrastructure::ui_bridge::{ChannelNotifier, SessionNotifier, UiEvent};
