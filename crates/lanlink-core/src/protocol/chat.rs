//! Chat line format used by the message relay.
//!
//! The session transport has no framing of its own: each write is one chat
//! line, and each buffer read on the other end is shown as one line.  The
//! sender stamps its address and local wall-clock time so both sides render
//! the same text.

use std::net::Ipv4Addr;

use chrono::NaiveTime;

/// Formats an outgoing chat line as `[<sender>][<HH:MM:SS>] <text>`.
///
/// # Examples
///
/// ```rust
/// use chrono::NaiveTime;
/// use lanlink_core::format_chat_line;
///
/// let at = NaiveTime::from_hms_opt(9, 5, 7).unwrap();
/// let line = format_chat_line("10.0.0.2".parse().unwrap(), at, "hi");
/// assert_eq!(line, "[10.0.0.2][09:05:07] hi");
/// ```
pub fn format_chat_line(sender: Ipv4Addr, at: NaiveTime, text: &str) -> String {
    format!("[{sender}][{}] {text}", at.format("%H:%M:%S"))
}
