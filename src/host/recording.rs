//! In-memory host that records side effects
//!
//! Answers queries from a fixed script and logs every mutating call, so
//! coordinator and transport behaviour can be checked without touching the
//! machine.

use super::{NetworkInfo, Persistence, RoutingControl, ServiceControl};
use crate::protocol::MacAddr;
use crate::{Error, Result};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A side effect requested from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    BringInterfaceUp,
    AddBroadcastHostRoute(String),
    RemoveBroadcastHostRoute(String),
    AddRoute {
        network: Ipv4Addr,
        mask: Ipv4Addr,
        gateway: Ipv4Addr,
    },
    StopDhcpService,
    StartDhcpService,
    WriteEndpointFile { path: PathBuf, value: String },
}

/// Scripted host double
#[derive(Debug)]
pub struct RecordingHost {
    interface: String,
    mac: MacAddr,
    address: Ipv4Addr,
    /// Address polls left that report the link as down
    polls_until_link: Mutex<usize>,
    default_route: bool,
    dhcp_service_active: bool,
    fail_add_route: bool,
    fail_stop_service: bool,
    fail_start_service: bool,
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    /// Host with the link already up, a default route and no DHCP service
    pub fn new(interface: impl Into<String>, mac: MacAddr) -> Self {
        Self {
            interface: interface.into(),
            mac,
            address: Ipv4Addr::new(10, 0, 0, 4),
            polls_until_link: Mutex::new(0),
            default_route: true,
            dhcp_service_active: false,
            fail_add_route: false,
            fail_stop_service: false,
            fail_start_service: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Report no address for the first `polls` queries
    pub fn with_link_after(self, polls: usize) -> Self {
        *self.polls_until_link.lock().unwrap_or_else(PoisonError::into_inner) = polls;
        self
    }

    pub fn with_default_route(mut self, present: bool) -> Self {
        self.default_route = present;
        self
    }

    pub fn with_dhcp_service_active(mut self, active: bool) -> Self {
        self.dhcp_service_active = active;
        self
    }

    /// Make every `add_route` fail
    pub fn with_failing_routes(mut self) -> Self {
        self.fail_add_route = true;
        self
    }

    /// Make stopping the DHCP service fail
    pub fn with_failing_service_stop(mut self) -> Self {
        self.fail_stop_service = true;
        self
    }

    /// Make restarting the DHCP service fail
    pub fn with_failing_service_start(mut self) -> Self {
        self.fail_start_service = true;
        self
    }

    /// Every side effect so far, in call order
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Routes passed to `add_route`, as (network, mask, gateway)
    pub fn installed_routes(&self) -> Vec<(Ipv4Addr, Ipv4Addr, Ipv4Addr)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::AddRoute {
                    network,
                    mask,
                    gateway,
                } => Some((network, mask, gateway)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

impl NetworkInfo for RecordingHost {
    fn interface_name(&self) -> &str {
        &self.interface
    }

    fn current_ipv4_address(&self) -> Result<Option<Ipv4Addr>> {
        let mut pending = self.polls_until_link.lock().unwrap_or_else(PoisonError::into_inner);
        if *pending > 0 {
            *pending -= 1;
            return Ok(None);
        }
        Ok(Some(self.address))
    }

    fn mac_address(&self) -> Result<MacAddr> {
        Ok(self.mac)
    }

    fn bring_interface_up(&self) -> Result<()> {
        self.record(HostCall::BringInterfaceUp);
        Ok(())
    }
}

impl RoutingControl for RecordingHost {
    fn has_default_route(&self) -> Result<bool> {
        Ok(self.default_route)
    }

    fn add_broadcast_host_route(&self, ifname: &str) -> Result<()> {
        self.record(HostCall::AddBroadcastHostRoute(ifname.to_string()));
        Ok(())
    }

    fn remove_broadcast_host_route(&self, ifname: &str) -> Result<()> {
        self.record(HostCall::RemoveBroadcastHostRoute(ifname.to_string()));
        Ok(())
    }

    fn add_route(&self, network: Ipv4Addr, mask: Ipv4Addr, gateway: Ipv4Addr) -> Result<()> {
        if self.fail_add_route {
            return Err(Error::Command {
                command: format!("ip route replace {}", network),
                detail: "RTNETLINK answers: Network is unreachable".to_string(),
            });
        }
        self.record(HostCall::AddRoute {
            network,
            mask,
            gateway,
        });
        Ok(())
    }
}

impl ServiceControl for RecordingHost {
    fn is_system_dhcp_service_active(&self) -> Result<bool> {
        Ok(self.dhcp_service_active)
    }

    fn stop_system_dhcp_service(&self) -> Result<()> {
        self.record(HostCall::StopDhcpService);
        if self.fail_stop_service {
            return Err(Error::Command {
                command: "systemctl stop dhclient".to_string(),
                detail: "Access denied".to_string(),
            });
        }
        Ok(())
    }

    fn start_system_dhcp_service(&self) -> Result<()> {
        self.record(HostCall::StartDhcpService);
        if self.fail_start_service {
            return Err(Error::Command {
                command: "systemctl start dhclient".to_string(),
                detail: "Unit dhclient.service not found.".to_string(),
            });
        }
        Ok(())
    }
}

impl Persistence for RecordingHost {
    fn write_endpoint_file(&self, path: &Path, value: &str) -> Result<()> {
        self.record(HostCall::WriteEndpointFile {
            path: path.to_path_buf(),
            value: value.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_comes_up_after_polls() {
        let host = RecordingHost::new("eth0", MacAddr::ZERO).with_link_after(2);
        assert_eq!(host.current_ipv4_address().unwrap(), None);
        assert_eq!(host.current_ipv4_address().unwrap(), None);
        assert_eq!(
            host.current_ipv4_address().unwrap(),
            Some(Ipv4Addr::new(10, 0, 0, 4))
        );
    }

    #[test]
    fn test_records_calls_in_order() {
        let host = RecordingHost::new("eth0", MacAddr::ZERO);
        host.stop_system_dhcp_service().unwrap();
        host.add_route(
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::new(10, 0, 0, 1),
        )
        .unwrap();
        host.start_system_dhcp_service().unwrap();

        assert_eq!(
            host.calls(),
            vec![
                HostCall::StopDhcpService,
                HostCall::AddRoute {
                    network: Ipv4Addr::UNSPECIFIED,
                    mask: Ipv4Addr::UNSPECIFIED,
                    gateway: Ipv4Addr::new(10, 0, 0, 1),
                },
                HostCall::StartDhcpService,
            ]
        );
        assert_eq!(host.installed_routes().len(), 1);
    }

    #[test]
    fn test_failing_routes() {
        let host = RecordingHost::new("eth0", MacAddr::ZERO).with_failing_routes();
        let result = host.add_route(
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::new(10, 0, 0, 1),
        );
        assert!(matches!(result, Err(Error::Command { .. })));
        assert!(host.calls().is_empty());
    }
}
