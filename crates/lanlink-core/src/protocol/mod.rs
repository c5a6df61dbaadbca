//! Protocol module: the discovery announcement codec, the chat line format,
//! and the well-known ports and timings both peers must agree on.

pub mod announcement;
pub mod chat;

use std::ops::Range;
use std::time::Duration;

pub use announcement::{Announcement, AnnouncementError};
pub use chat::format_chat_line;

/// UDP port every peer binds for discovery broadcasts.
pub const DISCOVERY_PORT: u16 = 41234;

/// Range the TCP session port is drawn from at startup (end exclusive).
pub const SESSION_PORT_RANGE: Range<u16> = 40000..41000;

/// Interval between two `HELLO` broadcasts.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(2);

/// Interval between two countdown ticks.
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// How long a discovery round lasts before the peer gives up.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(11);

/// Value the countdown starts from, in seconds.
pub const COUNTDOWN_START_SECS: u32 = 11;
