//! Domain entities for LanLink.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code has no imports from sockets,
//! timers, or UI frameworks, so it can be compiled and tested anywhere.
//!
//! For LanLink the domain is small but it is where the correctness lives:
//! the rendezvous [`phase::RendezvousState`] decides who wins the race between
//! an inbound accept and an outbound dial, and it rejects events that belong
//! to an earlier discovery round.

/// This host's address and session port.
pub mod identity;

/// Discovery phase, countdown, and the first-wins transition.
pub mod phase;

/// Session descriptors.
pub mod session;
