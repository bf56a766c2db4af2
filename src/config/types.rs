//! Configuration types

use crate::telemetry::LogConfig;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default wait before each DISCOVER attempt, in seconds
pub const DEFAULT_RETRY_SCHEDULE: [u64; 5] = [0, 10, 30, 60, 60];

/// Well-known file the endpoint is written to under `lib_dir`
pub const WIRE_SERVER_ADDR_FILE_NAME: &str = "WireServer";

/// Probe configuration (config.toml); every section is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub interface: InterfaceConfig,
    pub probe: ProbeConfig,
    pub dhcp_service: DhcpServiceConfig,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Interface to probe on; autodetected when unset
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Agent state directory holding the endpoint file
    pub lib_dir: PathBuf,
    pub endpoint_file: String,
    /// Receive window per attempt, in seconds
    pub receive_timeout: u64,
    /// Wait before each attempt, in seconds
    pub retry_schedule: Vec<u64>,
    /// Pause between link polls, in seconds
    pub link_poll_interval: u64,
    /// Destination of the DISCOVER
    pub server_addr: Ipv4Addr,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            lib_dir: PathBuf::from("/var/lib/waagent"),
            endpoint_file: WIRE_SERVER_ADDR_FILE_NAME.to_string(),
            receive_timeout: 10,
            retry_schedule: DEFAULT_RETRY_SCHEDULE.to_vec(),
            link_poll_interval: 10,
            server_addr: Ipv4Addr::BROADCAST,
        }
    }
}

impl ProbeConfig {
    pub fn endpoint_path(&self) -> PathBuf {
        Path::new(&self.lib_dir).join(&self.endpoint_file)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout)
    }

    pub fn link_poll_interval(&self) -> Duration {
        Duration::from_secs(self.link_poll_interval)
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_schedule
            .iter()
            .map(|secs| Duration::from_secs(*secs))
            .collect()
    }
}

/// System DHCP client that competes for the client port
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DhcpServiceConfig {
    /// systemd unit name
    pub name: String,
}

impl Default for DhcpServiceConfig {
    fn default() -> Self {
        Self {
            name: "dhclient".to_string(),
        }
    }
}
