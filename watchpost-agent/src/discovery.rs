//! Server identity discovery
//!
//! Builds the `<nice name> <hostname> with IP <ip>` string included in
//! every alert:
//! - Hostname from the OS
//! - Primary IP from interface enumeration (Ethernet > WiFi > other, IPv4 first)
//! - Any lookup failure falls back to a placeholder instead of aborting

use anyhow::{Context, Result};
use if_addrs::{get_if_addrs, Interface};
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Placeholder used when a part of the identity cannot be discovered
pub const UNKNOWN: &str = "NIL";

/// Priority order for interface selection
const INTERFACE_PRIORITY: &[&str] = &[
    "eth", "en", "ens", "enp", "eno", // Ethernet (Linux/macOS patterns)
    "wlan", "wlp", "wlo", "wifi", // WiFi
];

/// Identity of the monitored server, computed once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub nice_name: String,
    pub hostname: String,
    pub ip: String,
}

impl ServerIdentity {
    /// Discover hostname and primary IP; never fails
    pub fn discover(nice_name: &str) -> Self {
        let hostname = discover_hostname().unwrap_or_else(|e| {
            warn!("Error getting hostname, using {}: {:#}", UNKNOWN, e);
            UNKNOWN.to_string()
        });

        let ip = discover_primary_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|e| {
                warn!("Error getting server IP, using {}: {:#}", UNKNOWN, e);
                UNKNOWN.to_string()
            });

        let identity = Self {
            nice_name: nice_name.to_string(),
            hostname,
            ip,
        };
        info!("Server identity: {}", identity);
        identity
    }

    pub fn placeholder(nice_name: &str) -> Self {
        Self {
            nice_name: nice_name.to_string(),
            hostname: UNKNOWN.to_string(),
            ip: UNKNOWN.to_string(),
        }
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} with IP {}", self.nice_name, self.hostname, self.ip)
    }
}

fn discover_hostname() -> Result<String> {
    let name = hostname::get().context("Failed to read hostname")?;
    let name = name.to_string_lossy().trim().to_string();
    if name.is_empty() {
        anyhow::bail!("Hostname is empty");
    }
    Ok(name)
}

fn discover_primary_ip() -> Result<IpAddr> {
    let interfaces = get_if_addrs().context("Failed to enumerate network interfaces")?;
    select_primary_ip(&interfaces).ok_or_else(|| anyhow::anyhow!("No non-loopback interface found"))
}

/// Rank an interface name; lower is preferred
fn interface_rank(name: &str) -> usize {
    let name = name.to_lowercase();
    INTERFACE_PRIORITY
        .iter()
        .position(|prefix| name.starts_with(prefix))
        .unwrap_or(INTERFACE_PRIORITY.len())
}

fn select_primary_ip(interfaces: &[Interface]) -> Option<IpAddr> {
    let mut candidates: Vec<&Interface> = interfaces.iter().filter(|i| !i.is_loopback()).collect();

    // IPv4 before IPv6, then by interface priority
    candidates.sort_by_key(|i| (!i.ip().is_ipv4(), interface_rank(&i.name)));

    let selected = candidates.first()?;
    debug!("Selected interface {} ({})", selected.name, selected.ip());
    Some(selected.ip())
}
