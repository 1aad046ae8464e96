//! System metrics collection for the Cricket ingestion API
//!
//! Builds one `MetricsSnapshot` per cycle:
//! - Host identity used for server self-registration
//! - CPU usage and load averages
//! - Memory and swap usage
//! - Root filesystem usage, per-partition usage and block-device I/O
//! - Network counters for all interfaces combined
//!
//! Each group is read independently. A failing source leaves its group zeroed
//! and is only reported at debug level.

mod disk;
mod diskstats;
mod mounts;
#[cfg(test)]
pub(crate) mod fake;
pub mod probe;

use crate::config::Config;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use probe::{HostProbe, IoCounters};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

/// Length of the CPU utilization measurement window. Every cycle waits this long.
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

pub const COLLECTOR_TAG: &str = "cricket-rust-collector";

/// One point-in-time read of host state (matches the `/api/metrics/ingest` body)
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub identity: IdentityFields,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub cpu: CpuMetrics,
    #[serde(flatten)]
    pub memory: MemoryMetrics,
    #[serde(flatten)]
    pub disk: DiskMetrics,
    #[serde(flatten)]
    pub network: NetworkMetrics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disk_devices: Vec<DiskDevice>,
}

/// Server registration fields
#[derive(Debug, Clone, Serialize)]
pub struct IdentityFields {
    pub server_name: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub operating_system: String,
    pub architecture: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CpuMetrics {
    pub cpu_usage_percent: f64,
    pub cpu_load_1m: f64,
    pub cpu_load_5m: f64,
    pub cpu_load_15m: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryMetrics {
    pub memory_usage_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub memory_available_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_total_bytes: u64,
}

/// Root filesystem usage plus aggregate I/O over every block device
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiskMetrics {
    pub disk_usage_percent: f64,
    pub disk_used_bytes: u64,
    pub disk_total_bytes: u64,
    pub disk_available_bytes: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    pub disk_read_ops: u64,
    pub disk_write_ops: u64,
    pub disk_io_time: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkMetrics {
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub network_rx_packets: u64,
    pub network_tx_packets: u64,
    pub network_rx_errors: u64,
    pub network_tx_errors: u64,
}

/// Usage and I/O for one mounted partition. I/O fields stay `None` when no counters matched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiskDevice {
    pub device: String,
    pub mountpoint: String,
    pub filesystem: String,
    pub usage_percent: f64,
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub available_bytes: u64,
    #[serde(skip_serializing_if = "is_absent")]
    pub read_bytes: Option<u64>,
    #[serde(skip_serializing_if = "is_absent")]
    pub write_bytes: Option<u64>,
    #[serde(skip_serializing_if = "is_absent")]
    pub read_ops: Option<u64>,
    #[serde(skip_serializing_if = "is_absent")]
    pub write_ops: Option<u64>,
}

impl DiskDevice {
    fn attach_io(&mut self, io: &IoCounters) {
        self.read_bytes = Some(io.read_bytes);
        self.write_bytes = Some(io.write_bytes);
        self.read_ops = Some(io.read_count);
        self.write_ops = Some(io.write_count);
    }
}

// The ingest API treats a zero counter the same as a missing one
fn is_absent(value: &Option<u64>) -> bool {
    matches!(value, None | Some(0))
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn default_tags() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("collector".to_string(), COLLECTOR_TAG.to_string()),
        ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
    ])
}

/// Assembles snapshots from a `HostProbe`
pub struct Collector<P> {
    probe: P,
    cpu_window: Duration,
}

impl<P: HostProbe> Collector<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            cpu_window: CPU_SAMPLE_WINDOW,
        }
    }

    /// Override the CPU sampling window
    #[cfg(test)]
    pub fn with_cpu_window(mut self, window: Duration) -> Self {
        self.cpu_window = window;
        self
    }

    /// Collect one snapshot. Never fails; see module docs for partial failures.
    pub async fn collect(&mut self, config: &Config) -> MetricsSnapshot {
        debug!("Collecting system metrics...");

        let identity = self.collect_identity(config);
        let timestamp = Utc::now().trunc_subsecs(0);

        let cpu = self.collect_cpu().await;
        let memory = self.collect_memory();

        // Read once: feeds both per-device matching and the aggregate
        let io_counters = match self.probe.io_counters() {
            Ok(counters) => counters,
            Err(e) => {
                debug!("Disk I/O counters unavailable: {}", e);
                HashMap::new()
            }
        };

        let disk_devices = self.collect_disk_devices(&io_counters);
        let disk = self.collect_disk(&io_counters);
        let network = self.collect_network();

        MetricsSnapshot {
            identity,
            timestamp,
            cpu,
            memory,
            disk,
            network,
            disk_devices,
        }
    }

    fn collect_identity(&self, config: &Config) -> IdentityFields {
        let host = self.probe.identity();
        IdentityFields {
            server_name: config.server_name.clone(),
            hostname: host
                .hostname
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| config.server_name.clone()),
            ip_address: host.ip_address.filter(|ip| !ip.is_empty()),
            operating_system: host.operating_system,
            architecture: host.architecture,
            tags: default_tags(),
        }
    }

    async fn collect_cpu(&mut self) -> CpuMetrics {
        let mut cpu = CpuMetrics::default();

        self.probe.begin_cpu_sample();
        tokio::time::sleep(self.cpu_window).await;
        match self.probe.cpu_percent() {
            Ok(percent) => cpu.cpu_usage_percent = percent,
            Err(e) => debug!("CPU usage unavailable: {}", e),
        }

        match self.probe.load_average() {
            Ok(load) => {
                cpu.cpu_load_1m = load.one;
                cpu.cpu_load_5m = load.five;
                cpu.cpu_load_15m = load.fifteen;
            }
            Err(e) => debug!("Load average unavailable: {}", e),
        }

        cpu
    }

    fn collect_memory(&mut self) -> MemoryMetrics {
        let mut memory = MemoryMetrics::default();

        match self.probe.virtual_memory() {
            Ok(vm) => {
                memory.memory_usage_percent = vm.used_percent;
                memory.memory_used_bytes = vm.used;
                memory.memory_total_bytes = vm.total;
                memory.memory_available_bytes = vm.available;
            }
            Err(e) => debug!("Virtual memory unavailable: {}", e),
        }

        match self.probe.swap_memory() {
            Ok(swap) => {
                memory.swap_used_bytes = swap.used;
                memory.swap_total_bytes = swap.total;
            }
            Err(e) => debug!("Swap memory unavailable: {}", e),
        }

        memory
    }

    fn collect_disk(&self, io_counters: &HashMap<String, IoCounters>) -> DiskMetrics {
        let mut disk = DiskMetrics::default();

        match self.probe.disk_usage("/") {
            Ok(usage) => {
                disk.disk_usage_percent = usage.used_percent;
                disk.disk_used_bytes = usage.used;
                disk.disk_total_bytes = usage.total;
                disk.disk_available_bytes = usage.available;
            }
            Err(e) => debug!("Root filesystem usage unavailable: {}", e),
        }

        let total = disk::aggregate_io(io_counters);
        disk.disk_read_bytes = total.read_bytes;
        disk.disk_write_bytes = total.write_bytes;
        disk.disk_read_ops = total.read_count;
        disk.disk_write_ops = total.write_count;
        disk.disk_io_time = total.io_time;

        disk
    }

    fn collect_disk_devices(&mut self, io_counters: &HashMap<String, IoCounters>) -> Vec<DiskDevice> {
        let partitions = match self.probe.partitions() {
            Ok(partitions) => partitions,
            Err(e) => {
                debug!("Partition list unavailable: {}", e);
                return Vec::new();
            }
        };
        debug!("Found {} partitions", partitions.len());

        let mut devices = Vec::new();
        for partition in partitions {
            if disk::is_pseudo_filesystem(&partition.fstype) {
                continue;
            }

            let usage = match self.probe.disk_usage(&partition.mountpoint) {
                Ok(usage) => usage,
                Err(e) => {
                    debug!("Skipping {}: {}", partition.mountpoint, e);
                    continue;
                }
            };

            let mut device = DiskDevice {
                device: partition.device,
                mountpoint: partition.mountpoint,
                filesystem: partition.fstype,
                usage_percent: usage.used_percent,
                used_bytes: usage.used,
                total_bytes: usage.total,
                available_bytes: usage.available,
                ..DiskDevice::default()
            };
            if let Some(io) = disk::match_io_counters(&device.device, io_counters) {
                device.attach_io(io);
            }

            debug!(
                "Added disk: {} ({}) -> {}, {:.1}% used",
                device.device, device.filesystem, device.mountpoint, device.usage_percent
            );
            devices.push(device);
        }

        debug!("Collected {} disk devices", devices.len());
        devices
    }

    fn collect_network(&mut self) -> NetworkMetrics {
        match self.probe.network_totals() {
            Ok(net) => NetworkMetrics {
                network_rx_bytes: net.bytes_recv,
                network_tx_bytes: net.bytes_sent,
                network_rx_packets: net.packets_recv,
                network_tx_packets: net.packets_sent,
                network_rx_errors: net.errors_in,
                network_tx_errors: net.errors_out,
            },
            Err(e) => {
                debug!("Network counters unavailable: {}", e);
                NetworkMetrics::default()
            }
        }
    }
}
