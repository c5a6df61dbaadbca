//! Application layer of the peer.
//!
//! # What lives here?
//!
//! - **`events`** – The [`events::PeerEvent`] enum every transport and user
//!   command is turned into, plus the [`events::PeerHandle`] front ends use to
//!   send commands.
//!
//! - **`rendezvous`** – The `RendezvousService`: the one task that owns the
//!   phase, the discovery round, and the session set.  It decides which
//!   connection wins the rendezvous race, relays chat lines to every session,
//!   and reports progress through the `SessionNotifier`.

pub mod events;
pub mod rendezvous;
