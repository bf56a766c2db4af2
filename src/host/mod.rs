//! Host collaborators
//!
//! The probe touches the operating system only through these traits: reading
//! the interface state, editing the routing table, pausing the system DHCP
//! client and persisting the endpoint. `LinuxHost` drives the real system,
//! `RecordingHost` is an in-memory stand-in that records every side effect.

mod linux;
mod recording;

pub use linux::{is_privileged, LinuxHost};
pub use recording::{HostCall, RecordingHost};

use crate::protocol::MacAddr;
use crate::Result;
use std::net::Ipv4Addr;
use std::path::Path;

/// Interface facts and link control
pub trait NetworkInfo {
    /// Name of the interface the probe runs on
    fn interface_name(&self) -> &str;

    /// Current IPv4 address of the interface, `None` when unassigned
    fn current_ipv4_address(&self) -> Result<Option<Ipv4Addr>>;

    fn mac_address(&self) -> Result<MacAddr>;

    fn bring_interface_up(&self) -> Result<()>;
}

/// Routing table edits
pub trait RoutingControl {
    fn has_default_route(&self) -> Result<bool>;

    /// Route 255.255.255.255 out of `ifname` so a broadcast can leave a host
    /// without a default route
    fn add_broadcast_host_route(&self, ifname: &str) -> Result<()>;

    fn remove_broadcast_host_route(&self, ifname: &str) -> Result<()>;

    fn add_route(&self, network: Ipv4Addr, mask: Ipv4Addr, gateway: Ipv4Addr) -> Result<()>;
}

/// The distribution's own DHCP client, which competes for the client port
pub trait ServiceControl {
    fn is_system_dhcp_service_active(&self) -> Result<bool>;

    fn stop_system_dhcp_service(&self) -> Result<()>;

    fn start_system_dhcp_service(&self) -> Result<()>;
}

/// Durable record of the discovered endpoint
pub trait Persistence {
    fn write_endpoint_file(&self, path: &Path, value: &str) -> Result<()>;
}

/// Everything the coordinator needs from the host
pub trait Host: NetworkInfo + RoutingControl + ServiceControl + Persistence {}

impl<T> Host for T where T: NetworkInfo + RoutingControl + ServiceControl + Persistence {}
