//! Local identity resolution.
//!
//! The address is used for two things only: recognising our own broadcasts
//! when they loop back, and stamping outgoing chat lines.  It is therefore
//! never fatal to get it "wrong": a host without a LAN interface simply
//! degrades to `127.0.0.1`.

use std::net::{IpAddr, Ipv4Addr};
use std::ops::Range;

use lanlink_core::Identity;
use rand::Rng;
use tracing::{debug, warn};

use crate::infrastructure::storage::config::NetworkConfig;

/// Returns the first non-loopback IPv4 address of this host, or `127.0.0.1`.
pub fn resolve() -> Ipv4Addr {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            let address = first_external_ipv4(
                interfaces
                    .iter()
                    .filter(|iface| !iface.is_loopback())
                    .map(|iface| iface.ip()),
            );
            debug!("resolved local address {address}");
            address
        }
        Err(e) => {
            warn!("could not enumerate network interfaces: {e}; using loopback");
            Ipv4Addr::LOCALHOST
        }
    }
}

/// Picks the first IPv4, non-loopback address out of `candidates`.
pub fn first_external_ipv4(candidates: impl IntoIterator<Item = IpAddr>) -> Ipv4Addr {
    candidates
        .into_iter()
        .find_map(|ip| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
            _ => None,
        })
        .unwrap_or(Ipv4Addr::LOCALHOST)
}

/// Draws a random session port from `range`.  `range` must not be empty.
pub fn choose_session_port(range: Range<u16>) -> u16 {
    rand::thread_rng().gen_range(range)
}

/// Builds the process identity from the configuration.
///
/// A fixed `session_port` wins over the random range.
pub fn local_identity(network: &NetworkConfig) -> Identity {
    let port = network.session_port.unwrap_or_else(|| {
        choose_session_port(network.session_port_min..network.session_port_max)
    });
    Identity::new(resolve(), port)
}
