//! DHCP protocol - RFC 2131, 2132, 3442
//!
//! DHCPDISCOVER construction, response validation and the option walk that
//! extracts the wire server endpoint, default gateway and static routes.

use super::route_option::{parse_address, parse_routes, Route};
use super::MacAddr;
use crate::{Error, Result};
use serde::Serialize;
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// DHCP server port (bootps)
pub const DHCP_SERVER_PORT: u16 = 67;

/// DHCP client port (bootpc)
pub const DHCP_CLIENT_PORT: u16 = 68;

/// Fixed header size (before options)
pub const DHCP_HEADER_SIZE: usize = 236;

/// Magic cookie marking start of options
pub const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

/// Offset of the first option, right after the magic cookie
pub const FIRST_OPTION_OFFSET: usize = 0xF0;

/// Shortest response that carries the header plus the guaranteed options
pub const MIN_RESPONSE_SIZE: usize = 0xF6;

/// Requests are zero padded to the BOOTP minimum message size
pub const REQUEST_SIZE: usize = 300;

const XID_RANGE: std::ops::Range<usize> = 0x04..0x08;
const CHADDR_RANGE: std::ops::Range<usize> = 0x1C..0x22;
const COOKIE_RANGE: std::ops::Range<usize> = DHCP_HEADER_SIZE..FIRST_OPTION_OFFSET;

/// Ethernet hardware type
const HTYPE_ETHERNET: u8 = 1;

/// BOOTP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootpOp {
    Request = 1,
    Reply = 2,
}

/// DHCP message types (Option 53)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DhcpMessageType {
    Discover = 1,
}

/// DHCP option codes
pub mod options {
    pub const ROUTER: u8 = 3;
    pub const MESSAGE_TYPE: u8 = 53;
    /// Vendor-private option carrying the wire server endpoint
    pub const WIRE_SERVER_ENDPOINT: u8 = 245;
    /// Classless static routes (Microsoft code point for RFC 3442)
    pub const CLASSLESS_STATIC_ROUTE: u8 = 249;
    pub const END: u8 = 255;
}

/// A DHCPDISCOVER ready to send
///
/// Transaction id and client hardware address are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpRequest {
    buffer: Vec<u8>,
}

impl DhcpRequest {
    /// Build a DISCOVER for `mac` with a fresh random transaction id
    pub fn discover(mac: MacAddr) -> Self {
        Self::discover_with_xid(mac, rand::random::<[u8; 4]>())
    }

    /// Build a DISCOVER with a caller-chosen transaction id
    pub fn discover_with_xid(mac: MacAddr, xid: [u8; 4]) -> Self {
        let mut buffer = vec![0u8; REQUEST_SIZE];

        // Fixed header; secs, flags, addresses, sname and file stay zero
        buffer[0] = BootpOp::Request as u8;
        buffer[1] = HTYPE_ETHERNET;
        let chaddr = mac.octets();
        buffer[2] = chaddr.len() as u8;
        buffer[XID_RANGE].copy_from_slice(&xid);
        buffer[CHADDR_RANGE].copy_from_slice(&chaddr);

        // Magic cookie
        buffer[COOKIE_RANGE].copy_from_slice(&MAGIC_COOKIE);

        // Message Type = DISCOVER, End
        let opts = FIRST_OPTION_OFFSET;
        buffer[opts] = options::MESSAGE_TYPE;
        buffer[opts + 1] = 1;
        buffer[opts + 2] = DhcpMessageType::Discover as u8;
        buffer[opts + 3] = options::END;
        buffer[opts + 4] = options::END;

        debug!(
            "DHCP: built DISCOVER for {} (xid=0x{:08x})",
            mac,
            u32::from_be_bytes(xid)
        );

        Self { buffer }
    }

    /// Transaction ID
    pub fn xid(&self) -> u32 {
        be_u32(&self.buffer[XID_RANGE])
    }

    /// Client MAC address
    pub fn client_mac(&self) -> MacAddr {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buffer[CHADDR_RANGE]);
        MacAddr(mac)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

/// A received DHCP message, read through offset accessors only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpResponse {
    buffer: Vec<u8>,
}

impl DhcpResponse {
    pub fn from_bytes(buffer: impl Into<Vec<u8>>) -> Self {
        Self {
            buffer: buffer.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Transaction ID, if the response is long enough to carry one
    pub fn xid(&self) -> Option<u32> {
        self.buffer.get(XID_RANGE).map(be_u32)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Walk the options and collect the values this client understands
    pub fn parse_options(&self) -> DiscoveryResult {
        parse_options(&self.buffer)
    }
}

/// Values recovered from one response
///
/// `None` means the option was absent or unusable, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryResult {
    /// Wire server endpoint (option 245)
    pub endpoint: Option<Ipv4Addr>,
    /// Default gateway (option 3)
    pub gateway: Option<Ipv4Addr>,
    /// Classless static routes (option 249), in option order
    pub routes: Option<Vec<Route>>,
}

/// Walk the option area of `buffer` starting at the first option offset
///
/// The cursor advances by each option's declared length, so unknown options
/// are skipped without being understood.
pub fn parse_options(buffer: &[u8]) -> DiscoveryResult {
    let mut result = DiscoveryResult::default();
    let mut i = FIRST_OPTION_OFFSET;

    while i < buffer.len() {
        let code = buffer[i];
        let length = buffer.get(i + 1).copied().unwrap_or(0) as usize;

        trace!(
            "DHCP: option {} at offset 0x{:x} with length 0x{:x}",
            code,
            i,
            length
        );

        match code {
            options::END => {
                trace!("DHCP: options ended at offset 0x{:x}", i);
                break;
            }
            options::CLASSLESS_STATIC_ROUTE => {
                result.routes = parse_routes(buffer, i, length);
            }
            options::ROUTER => {
                result.gateway = parse_address(buffer, i, length);
                trace!("DHCP: default gateway {:?} at 0x{:x}", result.gateway, i);
            }
            options::WIRE_SERVER_ENDPOINT => {
                result.endpoint = parse_address(buffer, i, length);
                trace!("DHCP: wire server endpoint {:?} at 0x{:x}", result.endpoint, i);
            }
            _ => {
                trace!("DHCP: skipping option {} at 0x{:x}", code, i);
            }
        }

        i += length + 2;
    }

    result
}

/// Check that `response` answers `request`
///
/// Rejects short responses and any difference in magic cookie, transaction
/// id or client hardware address.
pub fn validate(request: &DhcpRequest, response: &DhcpResponse) -> Result<()> {
    let received = response.len();
    if received < MIN_RESPONSE_SIZE {
        return Err(Error::Protocol(format!(
            "too few bytes received: {}",
            received
        )));
    }

    let checks = [
        ("cookie", COOKIE_RANGE),
        ("transaction id", XID_RANGE),
        ("client hardware address", CHADDR_RANGE),
    ];

    for (field, range) in checks {
        let sent = &request.as_bytes()[range.clone()];
        let got = &response.as_bytes()[range];
        if sent != got {
            debug!(
                "DHCP: {} mismatch: sent={:02x?}, received={:02x?}",
                field, sent, got
            );
            return Err(Error::Protocol(format!(
                "{} in DHCP response doesn't match the request",
                field
            )));
        }
    }

    Ok(())
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
