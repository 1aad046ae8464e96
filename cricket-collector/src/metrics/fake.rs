//! Scriptable in-memory `HostProbe` for tests. `None` fields simulate a failing source.

use super::probe::{
    HostProbe, IoCounters, LoadAverage, NetworkCounters, Partition, ProbeError, SwapMemory, Usage,
    VirtualMemory,
};
use crate::discovery::HostIdentity;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub cpu: Option<f64>,
    pub load: Option<LoadAverage>,
    pub memory: Option<VirtualMemory>,
    pub swap: Option<SwapMemory>,
    /// Usage by mount point; a missing entry fails the lookup
    pub usage: HashMap<String, Usage>,
    pub partitions: Option<Vec<Partition>>,
    pub io: Option<HashMap<String, IoCounters>>,
    pub network: Option<NetworkCounters>,
    pub cpu_samples_started: usize,
}

pub fn partition(device: &str, mountpoint: &str, fstype: &str) -> Partition {
    Partition {
        device: device.to_string(),
        mountpoint: mountpoint.to_string(),
        fstype: fstype.to_string(),
    }
}

impl FakeProbe {
    /// Every source fails
    pub fn failing() -> Self {
        Self::default()
    }

    /// Every source answers with small, recognizable values
    pub fn healthy() -> Self {
        Self {
            hostname: Some("web-01.internal".to_string()),
            ip_address: Some("10.0.0.5".to_string()),
            cpu: Some(37.5),
            load: Some(LoadAverage {
                one: 1.25,
                five: 1.0,
                fifteen: 0.75,
            }),
            memory: Some(VirtualMemory {
                total: 8_000,
                used: 6_000,
                available: 2_000,
                used_percent: 75.0,
            }),
            swap: Some(SwapMemory {
                total: 2_000,
                used: 500,
            }),
            usage: HashMap::from([
                ("/".to_string(), Usage::from_blocks(100, 40, 30, 1_000)),
                ("/boot".to_string(), Usage::from_blocks(10, 8, 8, 1_000)),
            ]),
            partitions: Some(vec![
                partition("/dev/sda1", "/", "ext4"),
                partition("/dev/sda2", "/boot", "vfat"),
            ]),
            io: Some(Self::io_map(&[("sda", 2), ("sda1", 1)])),
            network: Some(NetworkCounters {
                bytes_recv: 5_000,
                bytes_sent: 4_000,
                packets_recv: 50,
                packets_sent: 40,
                errors_in: 1,
                errors_out: 2,
            }),
            cpu_samples_started: 0,
        }
    }

    /// Counters scaled by `n`, so sums are easy to predict
    pub fn io(n: u64) -> IoCounters {
        IoCounters {
            read_bytes: n * 512,
            write_bytes: n * 1_024,
            read_count: n * 3,
            write_count: n * 5,
            io_time: n * 7,
        }
    }

    pub fn io_map(entries: &[(&str, u64)]) -> HashMap<String, IoCounters> {
        entries
            .iter()
            .map(|(name, n)| (name.to_string(), Self::io(*n)))
            .collect()
    }
}

impl HostProbe for FakeProbe {
    fn identity(&self) -> HostIdentity {
        HostIdentity {
            hostname: self.hostname.clone(),
            operating_system: "linux".to_string(),
            architecture: "amd64".to_string(),
            ip_address: self.ip_address.clone(),
        }
    }

    fn begin_cpu_sample(&mut self) {
        self.cpu_samples_started += 1;
    }

    fn cpu_percent(&mut self) -> Result<f64, ProbeError> {
        self.cpu.ok_or(ProbeError::Unavailable("cpu usage"))
    }

    fn load_average(&self) -> Result<LoadAverage, ProbeError> {
        self.load.ok_or(ProbeError::Unavailable("load average"))
    }

    fn virtual_memory(&mut self) -> Result<VirtualMemory, ProbeError> {
        self.memory.ok_or(ProbeError::Unavailable("virtual memory"))
    }

    fn swap_memory(&mut self) -> Result<SwapMemory, ProbeError> {
        self.swap.ok_or(ProbeError::Unavailable("swap memory"))
    }

    fn disk_usage(&self, mountpoint: &str) -> Result<Usage, ProbeError> {
        self.usage
            .get(mountpoint)
            .copied()
            .ok_or(ProbeError::Unavailable("filesystem usage"))
    }

    fn partitions(&mut self) -> Result<Vec<Partition>, ProbeError> {
        self.partitions
            .clone()
            .ok_or(ProbeError::Unavailable("partition list"))
    }

    fn io_counters(&self) -> Result<HashMap<String, IoCounters>, ProbeError> {
        self.io
            .clone()
            .ok_or(ProbeError::Unavailable("block device I/O counters"))
    }

    fn network_totals(&mut self) -> Result<NetworkCounters, ProbeError> {
        self.network.ok_or(ProbeError::Unavailable("network counters"))
    }
}
