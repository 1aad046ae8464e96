//! Physical partition enumeration from /proc (Linux)
//!
//! A mount counts as physical when its device is not `none` and its filesystem type is
//! one the kernel does not flag `nodev` in /proc/filesystems. No other filtering happens
//! here; pseudo-filesystem exclusion is applied by the collector.
#![cfg_attr(not(target_os = "linux"), allow(dead_code))]

use super::probe::Partition;
use std::collections::HashSet;
use std::io;
use std::path::Path;

pub const MOUNTS_PATH: &str = "/proc/self/mounts";
pub const FILESYSTEMS_PATH: &str = "/proc/filesystems";

pub fn read_partitions(
    mounts: impl AsRef<Path>,
    filesystems: impl AsRef<Path>,
) -> io::Result<Vec<Partition>> {
    let physical = parse_filesystems(&std::fs::read_to_string(filesystems)?);
    let mounts = std::fs::read_to_string(mounts)?;
    Ok(parse_mounts(&mounts, &physical))
}

/// Filesystem types backed by a block device
pub fn parse_filesystems(raw: &str) -> HashSet<String> {
    let mut physical: HashSet<String> = raw
        .lines()
        .filter(|line| !line.starts_with("nodev"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect();
    // zfs registers as nodev but mounts real pools
    physical.insert("zfs".to_string());
    physical
}

/// Mount table entries whose type is in `physical`, in table order
pub fn parse_mounts(raw: &str, physical: &HashSet<String>) -> Vec<Partition> {
    raw.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mountpoint = fields.next()?;
            let fstype = fields.next()?;
            if device == "none" || !physical.contains(fstype) {
                return None;
            }
            Some(Partition {
                device: unescape(device),
                mountpoint: unescape(mountpoint),
                fstype: fstype.to_string(),
            })
        })
        .collect()
}

/// Undo the kernel's octal escaping of whitespace and backslashes (`\040` etc.)
fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Some(byte) = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|oct| u8::from_str_radix(oct, 8).ok())
            {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
