//! Scripted DHCP servers for driving the coordinator

use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wireprobe::protocol::dhcp::{options, FIRST_OPTION_OFFSET, REQUEST_SIZE};
use wireprobe::protocol::{DhcpRequest, DhcpResponse};
use wireprobe::transport::Exchange;
use wireprobe::{Error, Result};

/// Option stream of a reply, written after the magic cookie
#[derive(Debug, Clone, Default)]
pub struct ReplyOptions {
    bytes: Vec<u8>,
}

impl ReplyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(self, addr: Ipv4Addr) -> Self {
        self.raw(options::WIRE_SERVER_ENDPOINT, &addr.octets())
    }

    pub fn router(self, addr: Ipv4Addr) -> Self {
        self.raw(options::ROUTER, &addr.octets())
    }

    /// Classless static routes as (destination, prefix, gateway)
    pub fn routes(self, routes: &[(Ipv4Addr, u8, Ipv4Addr)]) -> Self {
        let mut payload = Vec::new();
        for (dest, prefix, gw) in routes {
            payload.push(*prefix);
            payload.extend_from_slice(&dest.octets()[..(*prefix as usize).div_ceil(8)]);
            payload.extend_from_slice(&gw.octets());
        }
        self.raw(options::CLASSLESS_STATIC_ROUTE, &payload)
    }

    pub fn raw(mut self, code: u8, payload: &[u8]) -> Self {
        self.bytes.push(code);
        self.bytes.push(payload.len() as u8);
        self.bytes.extend_from_slice(payload);
        self
    }

    /// Reply echoing the header of `request`
    pub fn reply_to(&self, request: &[u8]) -> Vec<u8> {
        let mut packet = request[..FIRST_OPTION_OFFSET].to_vec();
        packet[0] = 2;
        packet.extend_from_slice(&self.bytes);
        packet.push(options::END);
        if packet.len() < REQUEST_SIZE {
            packet.resize(REQUEST_SIZE, 0);
        }
        packet
    }
}

/// How the scripted server answers one attempt
#[derive(Debug, Clone)]
pub enum Reply {
    Silence,
    Answer(ReplyOptions),
    /// Answer with the transaction id flipped
    Foreign(ReplyOptions),
}

/// In-process exchange answering from a script, silent once it runs out
pub struct ScriptedExchange {
    replies: VecDeque<Reply>,
    pub requests: Vec<DhcpRequest>,
}

impl ScriptedExchange {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            requests: Vec::new(),
        }
    }
}

impl Exchange for ScriptedExchange {
    fn exchange(&mut self, request: &DhcpRequest) -> Result<DhcpResponse> {
        self.requests.push(request.clone());
        match self.replies.pop_front().unwrap_or(Reply::Silence) {
            Reply::Silence => Err(Error::Timeout(Duration::from_secs(10))),
            Reply::Answer(opts) => Ok(DhcpResponse::from_bytes(
                opts.reply_to(request.as_bytes()),
            )),
            Reply::Foreign(opts) => {
                let mut bytes = opts.reply_to(request.as_bytes());
                bytes[4] = bytes[4].wrapping_add(1);
                Ok(DhcpResponse::from_bytes(bytes))
            }
        }
    }
}

/// DHCP server on a loopback port answering a single request
pub struct LoopbackServer {
    pub addr: SocketAddrV4,
    handle: JoinHandle<usize>,
}

impl LoopbackServer {
    pub fn spawn(opts: ReplyOptions) -> Self {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind loopback server");
        let addr = match socket.local_addr().expect("server address") {
            std::net::SocketAddr::V4(addr) => addr,
            other => panic!("unexpected address {}", other),
        };

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 1500];
            let (len, from) = socket.recv_from(&mut buf).expect("receive DISCOVER");
            socket
                .send_to(&opts.reply_to(&buf[..len]), from)
                .expect("send reply");
            len
        });

        Self { addr, handle }
    }

    /// Size of the request the server saw
    pub fn join(self) -> usize {
        self.handle.join().expect("server thread")
    }
}
