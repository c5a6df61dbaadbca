//! Infrastructure layer for the peer application.
//!
//! Contains the OS-facing adapters: sockets, timers, the configuration file,
//! and the notification bridge towards whatever UI hosts the peer.
//!
//! # Sub-modules
//!
//! - **`network`** – The rendezvous transports: the local identity resolver,
//!   the TCP rendezvous listener, the UDP discovery broadcaster (with its
//!   countdown and timeout timers), the one-shot peer connector, and the
//!   per-session reader/writer tasks.  None of them mutate shared state;
//!   they only publish [`crate::application::events::PeerEvent`]s.
//!
//! - **`storage`** – TOML configuration load/save.
//!
//! - **`ui_bridge`** – The [`ui_bridge::SessionNotifier`] trait the core
//!   reports through, plus a channel-backed implementation for front ends.

pub mod network;
pub mod storage;
pub mod ui_bridge;
