//! Host identification for server self-registration
//!
//! Every submission carries these fields so the ingestion API can register
//! the server on first contact:
//! - Hostname, OS and CPU architecture, using Go's `GOOS`/`GOARCH` names
//!   (`linux`, `darwin`, `amd64`, `arm64`) so servers registered by earlier
//!   collectors keep matching
//! - Primary IP address, picked by interface priority (Ethernet > WiFi > Other)

use if_addrs::{get_if_addrs, IfAddr};
use std::net::IpAddr;
use tracing::debug;

/// Identity fields gathered from local host introspection
#[derive(Debug, Clone, PartialEq)]
pub struct HostIdentity {
    pub hostname: Option<String>,
    pub operating_system: String,
    pub architecture: String,
    pub ip_address: Option<String>,
}

/// Interface type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum InterfaceType {
    Ethernet,
    Wireless,
    Other,
}

impl HostIdentity {
    /// Discover identity of the local host. Never fails; unknown parts are left empty.
    pub fn discover() -> Self {
        let hostname = match hostname::get() {
            Ok(h) => Some(h.to_string_lossy().into_owned()).filter(|h| !h.is_empty()),
            Err(e) => {
                debug!("Failed to read hostname: {}", e);
                None
            }
        };

        let ip_address = match get_if_addrs() {
            Ok(addrs) => select_primary_ip(
                addrs
                    .into_iter()
                    .filter(|a| !a.is_loopback())
                    .map(|a| {
                        let ip = match a.addr {
                            IfAddr::V4(v4) => IpAddr::V4(v4.ip),
                            IfAddr::V6(v6) => IpAddr::V6(v6.ip),
                        };
                        (a.name, ip)
                    }),
            ),
            Err(e) => {
                debug!("Failed to enumerate network interfaces: {}", e);
                None
            }
        };

        HostIdentity {
            hostname,
            operating_system: os_name(std::env::consts::OS).to_string(),
            architecture: arch_name(std::env::consts::ARCH, cfg!(target_endian = "little"))
                .to_string(),
            ip_address,
        }
    }
}

fn os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_name(arch: &str, little_endian: bool) -> &str {
    match (arch, little_endian) {
        ("x86_64", _) => "amd64",
        ("x86", _) => "386",
        ("aarch64", _) => "arm64",
        ("loongarch64", _) => "loong64",
        ("powerpc64", true) => "ppc64le",
        ("powerpc64", false) => "ppc64",
        ("mips", true) => "mipsle",
        ("mips64", true) => "mips64le",
        (other, _) => other,
    }
}

/// Classify interface type based on name patterns
fn classify_interface(name: &str) -> InterfaceType {
    let name_lower = name.to_lowercase();

    if name_lower.starts_with("wl") || name_lower.contains("wifi") {
        return InterfaceType::Wireless;
    }

    // eth0, en0, ens3, enp0s3, eno1
    if name_lower.starts_with("eth") || name_lower.starts_with("en") {
        return InterfaceType::Ethernet;
    }

    InterfaceType::Other
}

/// Pick the address to report: IPv4 before IPv6, then Ethernet > WiFi > Other,
/// then enumeration order.
fn select_primary_ip<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = (String, IpAddr)>,
{
    candidates
        .into_iter()
        .filter(|(_, ip)| !ip.is_loopback() && !ip.is_unspecified())
        .enumerate()
        .min_by_key(|(order, (name, ip))| (ip.is_ipv6(), classify_interface(name), *order))
        .map(|(_, (_, ip))| ip.to_string())
}
