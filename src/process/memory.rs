//! Memory utilization for process snapshots.
//!
//! Resident set size comes from `/proc/<pid>/statm`, total RAM from
//! `<root>/meminfo`.

use once_cell::sync::Lazy;
use std::fs;
use std::io;
use std::path::Path;

fn get_page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                return size as u64;
            }
        }
    }
    4096
}

/// Memory page size in bytes.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Parses a "123 kB" value to kilobytes.
fn parse_kb_value(s: &str) -> Option<u64> {
    s.split_whitespace().next()?.parse().ok()
}

/// Reads total RAM in bytes from `<root>/meminfo`.
pub fn read_mem_total_bytes(root: &Path) -> io::Result<u64> {
    let content = fs::read_to_string(root.join("meminfo"))?;
    content
        .lines()
        .find_map(|l| l.strip_prefix("MemTotal:").and_then(parse_kb_value))
        .map(|kb| kb * 1024)
        .ok_or_else(|| io::Error::other("MemTotal not found in meminfo"))
}

/// Reads resident memory in bytes from /proc/<pid>/statm.
pub fn read_resident_bytes(proc_path: &Path) -> io::Result<u64> {
    let content = fs::read_to_string(proc_path.join("statm"))?;
    let pages: u64 = content
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| io::Error::other("Invalid statm format"))?;
    Ok(pages * *PAGE_SIZE)
}

/// Resident memory as a percentage of total RAM.
pub fn memory_percent(proc_path: &Path, mem_total_bytes: Option<u64>) -> io::Result<f32> {
    let total = mem_total_bytes
        .filter(|t| *t > 0)
        .ok_or_else(|| io::Error::other("total memory unknown"))?;
    let rss = read_resident_bytes(proc_path)?;
    Ok((rss as f64 / total as f64 * 100.0) as f32)
}
