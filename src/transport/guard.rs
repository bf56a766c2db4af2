//! Scoped host preparation around a broadcast exchange

use crate::host::{RoutingControl, ServiceControl};
use crate::Result;
use tracing::{debug, info, warn};

/// Broadcast host route, present only while the guard is armed
///
/// Installed when the host has no default route, since a broadcast has
/// nowhere to go otherwise.
pub struct BroadcastRouteGuard<'a, R: RoutingControl + ?Sized> {
    routing: &'a R,
    ifname: String,
    armed: bool,
}

impl<'a, R: RoutingControl + ?Sized> BroadcastRouteGuard<'a, R> {
    pub fn acquire(routing: &'a R, ifname: &str) -> Result<Self> {
        let armed = if routing.has_default_route()? {
            debug!("DHCP: default route present, no broadcast route needed");
            false
        } else {
            info!("DHCP: no default route, adding broadcast route on {}", ifname);
            routing.add_broadcast_host_route(ifname)?;
            true
        };

        Ok(Self {
            routing,
            ifname: ifname.to_string(),
            armed,
        })
    }

    /// Whether a route was installed and still needs removal
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Remove the route now, reporting failure
    pub fn release(mut self) -> Result<()> {
        self.undo()
    }

    fn undo(&mut self) -> Result<()> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;
        debug!("DHCP: removing broadcast route on {}", self.ifname);
        self.routing.remove_broadcast_host_route(&self.ifname)
    }
}

impl<R: RoutingControl + ?Sized> Drop for BroadcastRouteGuard<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.undo() {
            warn!("DHCP: failed to remove broadcast route: {}", e);
        }
    }
}

/// System DHCP client, stopped while the guard is armed
///
/// The system client binds the same port, so it is paused for the exchange
/// and restarted afterwards.
pub struct DhcpServiceGuard<'a, S: ServiceControl + ?Sized> {
    service: &'a S,
    armed: bool,
}

impl<'a, S: ServiceControl + ?Sized> DhcpServiceGuard<'a, S> {
    pub fn acquire(service: &'a S) -> Result<Self> {
        let armed = if service.is_system_dhcp_service_active()? {
            info!("DHCP: stopping system DHCP service");
            service.stop_system_dhcp_service()?;
            true
        } else {
            false
        };

        Ok(Self { service, armed })
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Restart the service now, reporting failure
    pub fn release(mut self) -> Result<()> {
        self.undo()
    }

    fn undo(&mut self) -> Result<()> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;
        info!("DHCP: restarting system DHCP service");
        self.service.start_system_dhcp_service()
    }
}

impl<S: ServiceControl + ?Sized> Drop for DhcpServiceGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.undo() {
            warn!("DHCP: failed to restart system DHCP service: {}", e);
        }
    }
}
