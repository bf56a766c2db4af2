//! DHCP exchange transport
//!
//! Sends a DISCOVER under a fixed retry schedule and hands back the first
//! response that answers it. The two failure classes are handled apart:
//! a timeout spends one slot of the schedule and tries again with a fresh
//! transaction id, while a response that fails validation ends the exchange
//! at once so a misbehaving server is not asked again.

mod guard;
mod udp;

pub use guard::{BroadcastRouteGuard, DhcpServiceGuard};
pub use udp::UdpExchange;

use crate::host::{NetworkInfo, RoutingControl, ServiceControl};
use crate::protocol::{validate, DhcpRequest, DhcpResponse, MacAddr};
use crate::telemetry::ProbeMetrics;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One request/response round trip
pub trait Exchange {
    /// Send `request` and wait for a single datagram
    ///
    /// Returns `Error::Timeout` when nothing arrives in the receive window.
    fn exchange(&mut self, request: &DhcpRequest) -> Result<DhcpResponse>;
}

/// Waits applied before each attempt; its length is the attempt count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn attempts(&self) -> usize {
        self.delays.len()
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(
            [0, 10, 30, 60, 60]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
        )
    }
}

/// Retry policy around an `Exchange`
#[derive(Debug)]
pub struct Transport<E> {
    exchange: E,
    schedule: RetrySchedule,
    metrics: Arc<ProbeMetrics>,
}

impl<E: Exchange> Transport<E> {
    pub fn new(exchange: E, schedule: RetrySchedule, metrics: Arc<ProbeMetrics>) -> Self {
        Self {
            exchange,
            schedule,
            metrics,
        }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn metrics(&self) -> &Arc<ProbeMetrics> {
        &self.metrics
    }

    /// Send DISCOVERs for `mac` until one is answered
    ///
    /// `Ok(None)` when every slot timed out or the answer was rejected.
    /// Errors other than timeouts (socket setup, send failures) propagate.
    pub fn send_with_retry(&mut self, mac: MacAddr) -> Result<Option<DhcpResponse>> {
        let attempts = self.schedule.attempts();

        for (attempt, delay) in self.schedule.delays().iter().enumerate() {
            if !delay.is_zero() {
                debug!("DHCP: waiting {:?} before attempt {}", delay, attempt + 1);
                std::thread::sleep(*delay);
            }

            let request = DhcpRequest::discover(mac);
            self.metrics.requests_sent.inc();
            debug!(
                "DHCP: sending DISCOVER (attempt {}/{}, xid=0x{:08x})",
                attempt + 1,
                attempts,
                request.xid()
            );

            let response = match self.exchange.exchange(&request) {
                Ok(response) => response,
                Err(Error::Timeout(window)) => {
                    self.metrics.timeouts.inc();
                    warn!(
                        "DHCP: no response within {:?} (attempt {}/{})",
                        window,
                        attempt + 1,
                        attempts
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            return match validate(&request, &response) {
                Ok(()) => {
                    self.metrics.responses_accepted.inc();
                    info!("DHCP: received {} byte response", response.len());
                    Ok(Some(response))
                }
                Err(e) => {
                    self.metrics.responses_rejected.inc();
                    error!("DHCP: rejecting response, not retrying: {}", e);
                    Ok(None)
                }
            };
        }

        warn!("DHCP: no response after {} attempts", attempts);
        Ok(None)
    }

    /// `send_with_retry` with the host prepared for a broadcast exchange
    ///
    /// Installs a broadcast host route when the host has no default route
    /// and stops an active system DHCP client. Both are undone on every
    /// exit path; an undo failure is reported only when the exchange itself
    /// succeeded.
    pub fn send_with_host_hooks<H>(&mut self, host: &H, mac: MacAddr) -> Result<Option<DhcpResponse>>
    where
        H: NetworkInfo + RoutingControl + ServiceControl + ?Sized,
    {
        let route_guard = BroadcastRouteGuard::acquire(host, host.interface_name())?;
        let service_guard = DhcpServiceGuard::acquire(host)?;

        let outcome = self.send_with_retry(mac);

        let service_released = service_guard.release();
        let route_released = route_guard.release();

        let response = outcome?;
        service_released?;
        route_released?;
        Ok(response)
    }
}
