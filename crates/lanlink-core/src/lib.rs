//! # lanlink-core
//!
//! Shared library for LanLink containing the discovery wire format, the
//! rendezvous state machine, and the session descriptors.
//!
//! It has zero dependencies on sockets, timers, or UI frameworks.  Everything
//! here is plain data plus pure transitions, which is what lets the peer
//! application test its race handling without a network.
//!
//! # Architecture overview (for beginners)
//!
//! LanLink lets two computers on the same LAN find each other and open a chat
//! session without any server in the middle.  Each peer:
//!
//! 1. Opens a TCP listener on a random port in `[40000, 41000)`.
//! 2. Broadcasts `HELLO:<that port>` over UDP every 2 seconds.
//! 3. Dials the first foreign peer it hears from, unless that peer dials it
//!    first.
//!
//! This crate defines the pieces of that dance that do not touch the OS:
//!
//! - **`protocol`** – The `HELLO:<port>` announcement codec, the chat line
//!   format, and the well-known ports and timings.
//!
//! - **`domain`** – The local [`Identity`], the [`Phase`] state machine with its
//!   first-wins check-and-set, and the session descriptors.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `lanlink_core::Phase` instead of `lanlink_core::domain::phase::Phase`.
pub use domain::identity::Identity;
pub use domain::phase::{Countdown, Phase, RendezvousState, Round};
pub use domain::session::{SessionId, SessionInfo, SessionOrigin};
pub use protocol::announcement::{Announcement, AnnouncementError};
pub use protocol::chat::format_chat_line;
