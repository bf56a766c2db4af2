//! Discovery coordinator
//!
//! Drives one discovery round on a single interface: wait until the link
//! has an address, run the DHCP exchange with the host prepared for a
//! broadcast, then persist the wire server endpoint and install the routes
//! the server handed out.
//!
//! The coordinator owns the result of the last successful round. A new
//! round replaces the whole record, so readers holding the previous
//! `Arc<Discovery>` keep a consistent view.

use crate::host::Host;
use crate::protocol::{DiscoveryResult, Route};
use crate::telemetry::ProbeMetrics;
use crate::transport::{Exchange, Transport};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// No round started yet
    Idle,
    /// Polling the interface for an address
    WaitingForLink,
    /// DHCP exchange in flight
    Probing,
    /// Last round produced a validated response
    Resolved,
    /// Last round ended without a usable response
    Failed,
}

/// What one successful round learned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discovery {
    pub interface: String,
    pub discovered_at: DateTime<Utc>,
    pub result: DiscoveryResult,
}

impl Discovery {
    pub fn endpoint(&self) -> Option<Ipv4Addr> {
        self.result.endpoint
    }

    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.result.gateway
    }

    pub fn routes(&self) -> &[Route] {
        self.result.routes.as_deref().unwrap_or_default()
    }
}

/// Discovery on one interface
pub struct DiscoveryCoordinator<H, E> {
    host: H,
    transport: Transport<E>,
    endpoint_path: PathBuf,
    link_poll_interval: Duration,
    state: ProbeState,
    current: Option<Arc<Discovery>>,
}

impl<H: Host, E: Exchange> DiscoveryCoordinator<H, E> {
    pub fn new(
        host: H,
        transport: Transport<E>,
        endpoint_path: impl Into<PathBuf>,
        link_poll_interval: Duration,
    ) -> Self {
        Self {
            host,
            transport,
            endpoint_path: endpoint_path.into(),
            link_poll_interval,
            state: ProbeState::Idle,
            current: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn transport(&self) -> &Transport<E> {
        &self.transport
    }

    pub fn metrics(&self) -> &Arc<ProbeMetrics> {
        self.transport.metrics()
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Snapshot of the last successful round
    pub fn current(&self) -> Option<Arc<Discovery>> {
        self.current.clone()
    }

    pub fn endpoint(&self) -> Option<Ipv4Addr> {
        self.current.as_ref().and_then(|d| d.endpoint())
    }

    /// Block until the interface reports a usable IPv4 address
    ///
    /// Never gives up. Collaborator errors are logged and the poll repeats.
    pub fn wait_for_link(&mut self) {
        let ifname = self.host.interface_name().to_string();

        loop {
            match self.host.current_ipv4_address() {
                Ok(Some(addr)) if !addr.is_unspecified() => {
                    debug!("Link: {} has address {}", ifname, addr);
                    return;
                }
                Ok(_) => info!("Link: waiting for network on {}", ifname),
                Err(e) => warn!("Link: failed to read address of {}: {}", ifname, e),
            }

            std::thread::sleep(self.link_poll_interval);

            if let Err(e) = self.host.bring_interface_up() {
                warn!("Link: failed to bring {} up: {}", ifname, e);
            }
        }
    }

    /// Run one discovery round
    ///
    /// `Ok(None)` when no usable response arrived; the previous snapshot is
    /// kept. Host failures while preparing the exchange or installing
    /// routes are returned as errors.
    pub fn probe(&mut self) -> Result<Option<Arc<Discovery>>> {
        self.state = ProbeState::WaitingForLink;
        self.wait_for_link();

        self.state = ProbeState::Probing;
        let outcome = self.exchange_and_apply();

        self.state = match &outcome {
            Ok(Some(_)) => ProbeState::Resolved,
            _ => ProbeState::Failed,
        };
        outcome
    }

    fn exchange_and_apply(&mut self) -> Result<Option<Arc<Discovery>>> {
        let mac = self.host.mac_address()?;
        if mac.is_zero() {
            warn!("Discovery: {} reports an all-zero hardware address", self.host.interface_name());
        }
        info!("Discovery: probing on {} ({})", self.host.interface_name(), mac);

        let Some(response) = self.transport.send_with_host_hooks(&self.host, mac)? else {
            warn!("Discovery: no usable DHCP response");
            return Ok(None);
        };

        let result = response.parse_options();

        match result.endpoint {
            Some(endpoint) => {
                info!("Discovery: wire server endpoint {}", endpoint);
                self.host
                    .write_endpoint_file(&self.endpoint_path, &endpoint.to_string())?;
            }
            None => warn!("Discovery: no wire server endpoint in DHCP response"),
        }

        let discovery = Arc::new(Discovery {
            interface: self.host.interface_name().to_string(),
            discovered_at: Utc::now(),
            result,
        });
        self.current = Some(Arc::clone(&discovery));

        self.install_routes(&discovery)?;
        Ok(Some(discovery))
    }

    fn install_routes(&self, discovery: &Discovery) -> Result<()> {
        let metrics = self.transport.metrics();

        if let Some(gateway) = discovery.gateway() {
            info!("Discovery: default gateway {}", gateway);
            self.host
                .add_route(Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED, gateway)?;
            metrics.routes_installed.inc();
        }

        for route in discovery.routes() {
            info!("Discovery: adding route {}", route);
            self.host
                .add_route(route.destination, route.mask, route.gateway)?;
            metrics.routes_installed.inc();
        }

        Ok(())
    }
}
