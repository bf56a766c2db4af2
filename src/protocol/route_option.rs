//! Address and classless static route options
//!
//! Decoders for the fixed 4-byte address options (3 router, 245 wire server
//! endpoint) and the RFC 3442 classless static route option (249).
//!
//! Every decoder takes the whole response buffer, the offset of the option
//! code byte and the declared payload length, so the payload starts at
//! `offset + 2`.

use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{error, trace, warn};

/// Size of an IPv4 address payload
const ADDRESS_LEN: usize = 4;

/// Smallest useful route entry: 1 prefix byte + 4 gateway bytes
const MIN_ROUTE_ENTRY_LEN: usize = 5;

/// Route decoded from option 249
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Destination network, already masked to the prefix
    pub destination: Ipv4Addr,
    /// Network mask derived from the prefix length
    pub mask: Ipv4Addr,
    /// Next hop
    pub gateway: Ipv4Addr,
}

impl Route {
    /// Build a route from a prefix length, masking the destination
    pub fn new(destination: Ipv4Addr, prefix_len: u8, gateway: Ipv4Addr) -> Self {
        let mask = prefix_to_mask(prefix_len);
        Self {
            destination: Ipv4Addr::from(u32::from(destination) & mask),
            mask: Ipv4Addr::from(mask),
            gateway,
        }
    }

    /// Default route (0.0.0.0/0) through `gateway`
    pub fn default_via(gateway: Ipv4Addr) -> Self {
        Self {
            destination: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            gateway,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        u32::from(self.mask).count_ones() as u8
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} via {}",
            self.destination,
            self.prefix_len(),
            self.gateway
        )
    }
}

/// Convert a prefix length (0-32) to a host-order mask
pub fn prefix_to_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        n if n >= 32 => u32::MAX,
        n => u32::MAX << (32 - n),
    }
}

/// Decode a 4-byte address option (3 or 245)
///
/// Returns `None` unless the declared length is exactly 4 and the payload
/// lies within the buffer.
pub fn parse_address(buffer: &[u8], offset: usize, length: usize) -> Option<Ipv4Addr> {
    let start = offset + 2;
    let end = start + ADDRESS_LEN;

    if end > buffer.len() {
        error!(
            "DHCP: data too small for option {} at 0x{:x}",
            buffer.get(offset).copied().unwrap_or_default(),
            offset
        );
        return None;
    }
    if length != ADDRESS_LEN {
        error!(
            "DHCP: address option at 0x{:x} has length {}, expected 4",
            offset, length
        );
        return None;
    }

    Some(Ipv4Addr::new(
        buffer[start],
        buffer[start + 1],
        buffer[start + 2],
        buffer[start + 3],
    ))
}

/// Decode a classless static route option (249)
///
/// Each entry is one prefix-length byte, `ceil(prefix/8)` significant
/// network bytes and a 4-byte gateway. Returns `None` when the declared
/// payload runs past the buffer. Otherwise returns every entry decoded
/// before the declared end, even when the entries do not tile the payload
/// exactly.
pub fn parse_routes(buffer: &[u8], offset: usize, length: usize) -> Option<Vec<Route>> {
    let start = offset + 2;
    let end = start + length;

    trace!("DHCP: routes at offset 0x{:x} with length 0x{:x}", offset, length);

    if end > buffer.len() {
        warn!(
            "DHCP: route option at 0x{:x} declares {} bytes, only {} available",
            offset,
            length,
            buffer.len().saturating_sub(start)
        );
        return None;
    }
    if length < MIN_ROUTE_ENTRY_LEN {
        error!("DHCP: data too small for route option (length {})", length);
    }

    let mut routes = Vec::new();
    let mut pos = start;

    while pos < end {
        let prefix_len = buffer[pos];
        if prefix_len > 32 {
            warn!(
                "DHCP: invalid route prefix length {} at 0x{:x}",
                prefix_len, pos
            );
            break;
        }

        let net_len = (prefix_len as usize).div_ceil(8);
        let entry_end = pos + 1 + net_len + ADDRESS_LEN;
        if entry_end > end {
            break;
        }

        let mut net = [0u8; 4];
        net[..net_len].copy_from_slice(&buffer[pos + 1..pos + 1 + net_len]);
        let gw_start = pos + 1 + net_len;
        let gateway = Ipv4Addr::new(
            buffer[gw_start],
            buffer[gw_start + 1],
            buffer[gw_start + 2],
            buffer[gw_start + 3],
        );

        routes.push(Route::new(Ipv4Addr::from(net), prefix_len, gateway));
        pos = entry_end;
    }

    if pos != end {
        warn!(
            "DHCP: unable to parse routes, stopped at 0x{:x} instead of 0x{:x} ({} decoded)",
            pos,
            end,
            routes.len()
        );
    }

    Some(routes)
}
