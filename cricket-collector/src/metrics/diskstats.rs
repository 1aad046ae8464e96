//! Block-device I/O counters from /proc/diskstats (Linux)
#![cfg_attr(not(target_os = "linux"), allow(dead_code))]

use super::probe::IoCounters;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::debug;

pub const DISKSTATS_PATH: &str = "/proc/diskstats";

/// diskstats reports sectors in 512-byte units regardless of the device's sector size
const SECTOR_SIZE: u64 = 512;

pub fn read_diskstats(path: impl AsRef<Path>) -> io::Result<HashMap<String, IoCounters>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(parse_diskstats(&raw))
}

/// Parse diskstats content, one entry per device line. Short or malformed lines are skipped.
pub fn parse_diskstats(raw: &str) -> HashMap<String, IoCounters> {
    raw.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, IoCounters)> {
    // major minor name reads merged sectors ms writes merged sectors ms in_flight io_ms weighted_ms ...
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 14 {
        return None;
    }
    let field = |i: usize| parts[i].parse::<u64>().ok();

    let counters = (|| {
        Some(IoCounters {
            read_count: field(3)?,
            read_bytes: field(5)?.saturating_mul(SECTOR_SIZE),
            write_count: field(7)?,
            write_bytes: field(9)?.saturating_mul(SECTOR_SIZE),
            io_time: field(12)?,
        })
    })();

    match counters {
        Some(counters) => Some((parts[2].to_string(), counters)),
        None => {
            debug!("Skipping malformed diskstats line: {}", line.trim());
            None
        }
    }
}
