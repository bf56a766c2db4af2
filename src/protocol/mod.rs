//! Wire formats
//!
//! BOOTP/DHCP message layout and the handful of options the probe decodes.

pub mod dhcp;
pub mod route_option;
pub mod types;

pub use dhcp::{validate, DhcpRequest, DhcpResponse, DiscoveryResult};
pub use route_option::Route;
pub use types::*;
