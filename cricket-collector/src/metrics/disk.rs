//! Partition filtering and partition-to-I/O-counter correlation

use super::probe::IoCounters;
use std::collections::HashMap;

/// Virtual filesystems that never show up as disk devices
pub const PSEUDO_FILESYSTEMS: [&str; 9] = [
    "tmpfs",
    "devtmpfs",
    "sysfs",
    "proc",
    "devpts",
    "securityfs",
    "cgroup",
    "cgroup2",
    "overlay",
];

pub fn is_pseudo_filesystem(fstype: &str) -> bool {
    PSEUDO_FILESYSTEMS.contains(&fstype)
}

/// Counter-map keys to try for a device path, in priority order:
/// the bare name (`sda1`), then the name without trailing digits (`sda`).
pub fn io_lookup_names(device: &str) -> [&str; 2] {
    let name = device.strip_prefix("/dev/").unwrap_or(device);
    [name, name.trim_end_matches(|c: char| c.is_ascii_digit())]
}

/// Find the I/O counters for a partition's device path. Exact names win over digit-stripped ones.
pub fn match_io_counters<'a>(
    device: &str,
    counters: &'a HashMap<String, IoCounters>,
) -> Option<&'a IoCounters> {
    io_lookup_names(device)
        .into_iter()
        .find_map(|name| counters.get(name))
}

/// Sum every entry of the counter map, whether or not a partition matched it
pub fn aggregate_io(counters: &HashMap<String, IoCounters>) -> IoCounters {
    counters
        .values()
        .fold(IoCounters::default(), |acc, io| IoCounters {
            read_bytes: acc.read_bytes.saturating_add(io.read_bytes),
            write_bytes: acc.write_bytes.saturating_add(io.write_bytes),
            read_count: acc.read_count.saturating_add(io.read_count),
            write_count: acc.write_count.saturating_add(io.write_count),
            io_time: acc.io_time.saturating_add(io.io_time),
        })
}
