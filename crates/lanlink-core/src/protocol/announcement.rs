//! Text codec for the discovery announcement.
//!
//! Wire format (one UDP datagram = one message, ASCII):
//! ```text
//! HELLO:<tcp_port>
//! ```
//!
//! The announcement carries no peer identifier.  A receiver learns the
//! sender's address from the datagram source and the session port from the
//! payload; that pair is all it needs to dial back.
//!
//! # Why is there a self-echo check? (for beginners)
//!
//! A UDP broadcast is delivered to *every* socket bound to the discovery port
//! on the subnet, including the sender's own socket.  Without a filter, each
//! peer would discover itself two seconds after starting.  The filter compares
//! the datagram's source address with our own address *and* the embedded port
//! with our own session port.  Both must match: a second peer running on the
//! same machine has the same address but a different port, and it is a real
//! peer.

use std::net::IpAddr;

use thiserror::Error;

use crate::domain::identity::Identity;

/// The only message kind the discovery channel understands.
pub const HELLO_KIND: &str = "HELLO";

/// Errors that can occur while parsing a discovery datagram.
///
/// None of these are surfaced to the user: a shared broadcast domain carries
/// plenty of unrelated traffic, so the receiver logs and drops them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnouncementError {
    /// The datagram is not valid UTF-8.
    #[error("announcement is not valid UTF-8")]
    NotUtf8,

    /// The datagram has no `:` separating kind and port.
    #[error("announcement has no ':' separator")]
    MissingSeparator,

    /// The kind field is something other than `HELLO`.
    #[error("unknown announcement kind: {0:?}")]
    UnknownKind(String),

    /// The port field is not a number in `1..=65535`.
    #[error("invalid announcement port: {0:?}")]
    InvalidPort(String),
}

/// A parsed `HELLO:<port>` announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Announcement {
    /// The sender's TCP session port.
    pub port: u16,
}

impl Announcement {
    /// Creates an announcement advertising `port`.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Encodes the announcement into its wire form.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lanlink_core::Announcement;
    ///
    /// assert_eq!(Announcement::new(40123).encode(), b"HELLO:40123".to_vec());
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        format!("{HELLO_KIND}:{}", self.port).into_bytes()
    }

    /// Parses one datagram.
    ///
    /// Fields after the second `:` are ignored.  Surrounding ASCII whitespace
    /// on the port (e.g. a trailing newline from a hand-typed `nc -u` test) is
    /// tolerated.
    ///
    /// # Errors
    ///
    /// Returns an [`AnnouncementError`] describing why the datagram is not a
    /// valid announcement.
    pub fn parse(datagram: &[u8]) -> Result<Self, AnnouncementError> {
        let text = std::str::from_utf8(datagram).map_err(|_| AnnouncementError::NotUtf8)?;

        let mut fields = text.split(':');
        let kind = fields.next().unwrap_or_default();
        let port = fields.next().ok_or(AnnouncementError::MissingSeparator)?;

        if kind != HELLO_KIND {
            return Err(AnnouncementError::UnknownKind(kind.to_string()));
        }

        let trimmed = port.trim_matches(|c: char| c.is_ascii_whitespace());
        match trimmed.parse::<u16>() {
            Ok(p) if p != 0 => Ok(Self { port: p }),
            _ => Err(AnnouncementError::InvalidPort(port.to_string())),
        }
    }

    /// Returns `true` when this announcement was sent by `local` itself.
    ///
    /// Both the source address and the embedded port must match.
    pub fn is_echo_of(&self, sender: IpAddr, local: &Identity) -> bool {
        sender == IpAddr::V4(local.address) && self.port == local.port
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
