//! OS metric sources
//!
//! `HostProbe` is the set of capabilities the collector needs from the
//! operating system. `SysinfoProbe` implements it with sysinfo for CPU,
//! memory and network, statvfs for filesystem usage, and /proc for the
//! mount table and block-device I/O counters.

use crate::discovery::HostIdentity;
use std::collections::HashMap;
#[cfg(not(target_os = "linux"))]
use sysinfo::Disks;
use sysinfo::{Networks, System};
use thiserror::Error;

/// A single metric source failed. Never fatal; the matching snapshot group stays zeroed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0} unavailable on this host")]
    Unavailable(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VirtualMemory {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwapMemory {
    pub total: u64,
    pub used: u64,
}

/// Filesystem usage for one mount point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub used_percent: f64,
}

impl Usage {
    /// Build from statvfs block counts. Used space counts blocks reserved for root,
    /// the percentage is relative to what unprivileged users can reach.
    pub fn from_blocks(
        blocks: u64,
        blocks_free: u64,
        blocks_available: u64,
        fragment_size: u64,
    ) -> Self {
        let total = blocks.saturating_mul(fragment_size);
        let available = blocks_available.saturating_mul(fragment_size);
        let used = blocks.saturating_sub(blocks_free).saturating_mul(fragment_size);
        let reachable = used.saturating_add(available);
        let used_percent = if reachable == 0 {
            0.0
        } else {
            used as f64 / reachable as f64 * 100.0
        };
        Usage {
            total,
            used,
            available,
            used_percent,
        }
    }
}

/// A mounted filesystem
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
}

/// Cumulative block-device I/O counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_count: u64,
    pub write_count: u64,
    /// Milliseconds spent doing I/O
    pub io_time: u64,
}

/// Network counters for all interfaces combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_recv: u64,
    pub bytes_sent: u64,
    pub packets_recv: u64,
    pub packets_sent: u64,
    pub errors_in: u64,
    pub errors_out: u64,
}

/// Read access to the local host's resource counters
pub trait HostProbe {
    fn identity(&self) -> HostIdentity;

    /// Start a CPU utilization window; `cpu_percent` closes it.
    fn begin_cpu_sample(&mut self);
    fn cpu_percent(&mut self) -> Result<f64, ProbeError>;
    fn load_average(&self) -> Result<LoadAverage, ProbeError>;

    fn virtual_memory(&mut self) -> Result<VirtualMemory, ProbeError>;
    fn swap_memory(&mut self) -> Result<SwapMemory, ProbeError>;

    fn disk_usage(&self, mountpoint: &str) -> Result<Usage, ProbeError>;
    fn partitions(&mut self) -> Result<Vec<Partition>, ProbeError>;
    /// Block-device counters keyed by short device name (`sda`, `sda1`, ...)
    fn io_counters(&self) -> Result<HashMap<String, IoCounters>, ProbeError>;

    fn network_totals(&mut self) -> Result<NetworkCounters, ProbeError>;
}

/// Production probe backed by sysinfo
pub struct SysinfoProbe {
    sys: System,
    #[cfg(not(target_os = "linux"))]
    disks: Disks,
    networks: Networks,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            #[cfg(not(target_os = "linux"))]
            disks: Disks::new(),
            networks: Networks::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn identity(&self) -> HostIdentity {
        HostIdentity::discover()
    }

    fn begin_cpu_sample(&mut self) {
        self.sys.refresh_cpu_usage();
    }

    fn cpu_percent(&mut self) -> Result<f64, ProbeError> {
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            return Err(ProbeError::Unavailable("cpu usage"));
        }
        Ok(self.sys.global_cpu_info().cpu_usage() as f64)
    }

    fn load_average(&self) -> Result<LoadAverage, ProbeError> {
        if !cfg!(unix) {
            return Err(ProbeError::Unavailable("load average"));
        }
        let load = System::load_average();
        Ok(LoadAverage {
            one: load.one,
            five: load.five,
            fifteen: load.fifteen,
        })
    }

    fn virtual_memory(&mut self) -> Result<VirtualMemory, ProbeError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(ProbeError::Unavailable("virtual memory"));
        }
        let used = self.sys.used_memory();
        Ok(VirtualMemory {
            total,
            used,
            available: self.sys.available_memory(),
            used_percent: used as f64 / total as f64 * 100.0,
        })
    }

    fn swap_memory(&mut self) -> Result<SwapMemory, ProbeError> {
        self.sys.refresh_memory();
        Ok(SwapMemory {
            total: self.sys.total_swap(),
            used: self.sys.used_swap(),
        })
    }

    #[cfg(unix)]
    fn disk_usage(&self, mountpoint: &str) -> Result<Usage, ProbeError> {
        let stat = nix::sys::statvfs::statvfs(mountpoint).map_err(std::io::Error::from)?;
        Ok(Usage::from_blocks(
            stat.blocks() as u64,
            stat.blocks_free() as u64,
            stat.blocks_available() as u64,
            stat.fragment_size() as u64,
        ))
    }

    #[cfg(not(unix))]
    fn disk_usage(&self, _mountpoint: &str) -> Result<Usage, ProbeError> {
        Err(ProbeError::Unavailable("filesystem usage"))
    }

    #[cfg(target_os = "linux")]
    fn partitions(&mut self) -> Result<Vec<Partition>, ProbeError> {
        Ok(super::mounts::read_partitions(
            super::mounts::MOUNTS_PATH,
            super::mounts::FILESYSTEMS_PATH,
        )?)
    }

    #[cfg(not(target_os = "linux"))]
    fn partitions(&mut self) -> Result<Vec<Partition>, ProbeError> {
        self.disks.refresh_list();
        Ok(self
            .disks
            .list()
            .iter()
            .map(|d| Partition {
                device: d.name().to_string_lossy().into_owned(),
                mountpoint: d.mount_point().to_string_lossy().into_owned(),
                fstype: d.file_system().to_string_lossy().into_owned(),
            })
            .collect())
    }

    #[cfg(target_os = "linux")]
    fn io_counters(&self) -> Result<HashMap<String, IoCounters>, ProbeError> {
        Ok(super::diskstats::read_diskstats(super::diskstats::DISKSTATS_PATH)?)
    }

    #[cfg(not(target_os = "linux"))]
    fn io_counters(&self) -> Result<HashMap<String, IoCounters>, ProbeError> {
        Err(ProbeError::Unavailable("block device I/O counters"))
    }

    fn network_totals(&mut self) -> Result<NetworkCounters, ProbeError> {
        self.networks.refresh_list();
        if self.networks.iter().next().is_none() {
            return Err(ProbeError::Unavailable("network counters"));
        }
        // sysinfo has no combined pseudo-interface; build it here
        let interfaces = self.networks.iter().map(|(_, data)| NetworkCounters {
            bytes_recv: data.total_received(),
            bytes_sent: data.total_transmitted(),
            packets_recv: data.total_packets_received(),
            packets_sent: data.total_packets_transmitted(),
            errors_in: data.total_errors_on_received(),
            errors_out: data.total_errors_on_transmitted(),
        });
        Ok(combine_interfaces(interfaces))
    }
}

/// Sum per-interface counters into one combined record
pub fn combine_interfaces(
    interfaces: impl IntoIterator<Item = NetworkCounters>,
) -> NetworkCounters {
    interfaces
        .into_iter()
        .fold(NetworkCounters::default(), |acc, nic| NetworkCounters {
            bytes_recv: acc.bytes_recv.saturating_add(nic.bytes_recv),
            bytes_sent: acc.bytes_sent.saturating_add(nic.bytes_sent),
            packets_recv: acc.packets_recv.saturating_add(nic.packets_recv),
            packets_sent: acc.packets_sent.saturating_add(nic.packets_sent),
            errors_in: acc.errors_in.saturating_add(nic.errors_in),
            errors_out: acc.errors_out.saturating_add(nic.errors_out),
        })
}
