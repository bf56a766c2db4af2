//! Linux binding of the host collaborators
//!
//! Shells out to iproute2 and systemctl, reads sysfs for the hardware
//! address and writes the endpoint file directly.

use super::{NetworkInfo, Persistence, RoutingControl, ServiceControl};
use crate::protocol::MacAddr;
use crate::{Error, Result};
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

const SYSFS_NET: &str = "/sys/class/net";

const SERVICE_MANAGER: &str = "systemctl";

/// Host route that carries limited broadcasts
const BROADCAST_HOST_ROUTE: &str = "255.255.255.255/32";

/// True when running as root, which binding the DHCP client port requires
pub fn is_privileged() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Host collaborators backed by `ip`, `systemctl` and sysfs
#[derive(Debug, Clone)]
pub struct LinuxHost {
    interface: String,
    dhcp_service: String,
    sysfs_root: PathBuf,
    service_manager: String,
}

impl LinuxHost {
    pub fn new(interface: impl Into<String>, dhcp_service: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            dhcp_service: dhcp_service.into(),
            sysfs_root: PathBuf::from(SYSFS_NET),
            service_manager: SERVICE_MANAGER.to_string(),
        }
    }

    /// Pick the first non-loopback interface listed in sysfs
    pub fn detect_interface() -> Result<String> {
        detect_interface_in(Path::new(SYSFS_NET))
    }

    fn ip(&self, args: &[&str]) -> Result<String> {
        run("ip", args)
    }

    fn systemctl(&self, action: &str) -> Result<String> {
        run(&self.service_manager, &[action, &self.dhcp_service])
    }
}

impl NetworkInfo for LinuxHost {
    fn interface_name(&self) -> &str {
        &self.interface
    }

    fn current_ipv4_address(&self) -> Result<Option<Ipv4Addr>> {
        let output = self.ip(&["-4", "-o", "addr", "show", "dev", &self.interface])?;
        Ok(parse_inet_addr(&output))
    }

    fn mac_address(&self) -> Result<MacAddr> {
        let path = self.sysfs_root.join(&self.interface).join("address");
        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::InterfaceNotFound {
                name: self.interface.clone(),
            },
            _ => Error::Io(e),
        })?;
        content
            .trim()
            .parse()
            .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
    }

    fn bring_interface_up(&self) -> Result<()> {
        self.ip(&["link", "set", "dev", &self.interface, "up"])?;
        Ok(())
    }
}

impl RoutingControl for LinuxHost {
    fn has_default_route(&self) -> Result<bool> {
        let output = self.ip(&["-4", "route", "show", "default"])?;
        Ok(!output.trim().is_empty())
    }

    fn add_broadcast_host_route(&self, ifname: &str) -> Result<()> {
        debug!("Adding broadcast host route on {}", ifname);
        self.ip(&["route", "add", BROADCAST_HOST_ROUTE, "dev", ifname])?;
        Ok(())
    }

    fn remove_broadcast_host_route(&self, ifname: &str) -> Result<()> {
        debug!("Removing broadcast host route on {}", ifname);
        self.ip(&["route", "del", BROADCAST_HOST_ROUTE, "dev", ifname])?;
        Ok(())
    }

    fn add_route(&self, network: Ipv4Addr, mask: Ipv4Addr, gateway: Ipv4Addr) -> Result<()> {
        let args = route_args(network, mask, gateway, &self.interface);
        info!("Adding route {}", args[2..].join(" "));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.ip(&args)?;
        Ok(())
    }
}

impl ServiceControl for LinuxHost {
    fn is_system_dhcp_service_active(&self) -> Result<bool> {
        let status = Command::new(&self.service_manager)
            .args(["is-active", "--quiet", &self.dhcp_service])
            .status();

        match status {
            Ok(status) => Ok(status.success()),
            // No service manager, so nothing can be running under it
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(
                    "{} not available, treating {} as inactive",
                    self.service_manager, self.dhcp_service
                );
                Ok(false)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn stop_system_dhcp_service(&self) -> Result<()> {
        info!("Stopping {}", self.dhcp_service);
        self.systemctl("stop")?;
        Ok(())
    }

    fn start_system_dhcp_service(&self) -> Result<()> {
        info!("Starting {}", self.dhcp_service);
        self.systemctl("start")?;
        Ok(())
    }
}

impl Persistence for LinuxHost {
    fn write_endpoint_file(&self, path: &Path, value: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, value)?;
        Ok(())
    }
}

/// Run a command, returning stdout or a `Command` error carrying stderr
fn run(program: &str, args: &[&str]) -> Result<String> {
    let command = format!("{} {}", program, args.join(" "));
    debug!("Running `{}`", command);

    let Output {
        status,
        stdout,
        stderr,
    } = Command::new(program).args(args).output()?;

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        let detail = if stderr.is_empty() {
            status.to_string()
        } else {
            stderr
        };
        return Err(Error::Command { command, detail });
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

/// `ip route replace` arguments; an unspecified gateway means on-link
fn route_args(network: Ipv4Addr, mask: Ipv4Addr, gateway: Ipv4Addr, ifname: &str) -> Vec<String> {
    let destination = format!("{}/{}", network, u32::from(mask).count_ones());
    let (key, value) = if gateway.is_unspecified() {
        ("dev", ifname.to_string())
    } else {
        ("via", gateway.to_string())
    };
    vec![
        "route".to_string(),
        "replace".to_string(),
        destination,
        key.to_string(),
        value,
    ]
}

/// Extract the first address from `ip -4 -o addr show` output
fn parse_inet_addr(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        fields.find(|f| *f == "inet")?;
        let cidr = fields.next()?;
        cidr.split('/').next()?.parse().ok()
    })
}

fn detect_interface_in(root: &Path) -> Result<String> {
    let mut names: Vec<String> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "lo")
        .collect();
    names.sort();

    names.into_iter().next().ok_or_else(|| Error::InterfaceNotFound {
        name: "<any non-loopback>".to_string(),
    })
}
