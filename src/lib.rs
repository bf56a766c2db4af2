//! wireprobe - DHCP discovery for guest network bootstrap
//!
//! Broadcasts a single DHCPDISCOVER, validates the reply against the request
//! and recovers the wire server endpoint (option 245), the default gateway
//! (option 3) and classless static routes (option 249).

pub mod config;
pub mod discovery;
pub mod error;
pub mod host;
pub mod protocol;
pub mod telemetry;
pub mod transport;

pub use error::{Error, Result};
