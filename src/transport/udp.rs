//! UDP exchange over the DHCP ports

use super::Exchange;
use crate::protocol::dhcp::{DHCP_CLIENT_PORT, DHCP_SERVER_PORT};
use crate::protocol::{DhcpRequest, DhcpResponse};
use crate::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;
use tracing::{debug, trace};

/// Largest datagram read back
const RECV_BUFFER_SIZE: usize = 1500;

/// Broadcast exchange, one socket per call
#[derive(Debug, Clone)]
pub struct UdpExchange {
    bind_addr: SocketAddrV4,
    server_addr: SocketAddrV4,
    timeout: Duration,
}

impl UdpExchange {
    /// Bind the client port on all addresses and broadcast to the server port
    pub fn new(timeout: Duration) -> Self {
        Self::with_addresses(
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DHCP_CLIENT_PORT),
            SocketAddrV4::new(Ipv4Addr::BROADCAST, DHCP_SERVER_PORT),
            timeout,
        )
    }

    pub fn with_addresses(bind_addr: SocketAddrV4, server_addr: SocketAddrV4, timeout: Duration) -> Self {
        Self {
            bind_addr,
            server_addr,
            timeout,
        }
    }

    pub fn with_server(mut self, server: Ipv4Addr) -> Self {
        self.server_addr.set_ip(server);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn open_socket(&self) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.bind(&self.bind_addr.into())?;
        socket.set_read_timeout(Some(self.timeout))?;
        Ok(socket.into())
    }
}

impl Exchange for UdpExchange {
    fn exchange(&mut self, request: &DhcpRequest) -> Result<DhcpResponse> {
        let socket = self.open_socket()?;

        let sent = socket.send_to(request.as_bytes(), self.server_addr)?;
        debug!("DHCP: sent {} bytes to {}", sent, self.server_addr);

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                trace!("DHCP: received {} bytes from {}", len, from);
                Ok(DhcpResponse::from_bytes(&buf[..len]))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(Error::Timeout(self.timeout))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
