//! Process scanning utilities for discovering and reading process entries from /proc.
//!
//! This module provides functions to enumerate the /proc filesystem and read
//! per-process name, state and command line.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Process entry representing a directory in /proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Scans the proc root for process entries with numeric PIDs.
///
/// Only a failure to list the directory itself is an error; unreadable
/// individual entries are skipped.
pub fn collect_proc_entries(root: &Path) -> io::Result<Vec<ProcEntry>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let p = entry.path();
        let name = match p.file_name().and_then(|s| s.to_str()) {
            Some(v) => v,
            None => continue,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let pid: u32 = match name.parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        out.push(ProcEntry { pid, proc_path: p });
    }
    Ok(out)
}

/// Reads process name from comm file or extracts from cmdline.
pub fn read_process_name(proc_path: &Path) -> io::Result<String> {
    let comm = proc_path.join("comm");
    if let Ok(s) = fs::read_to_string(&comm) {
        let t = s.trim();
        if !t.is_empty() {
            return Ok(t.into());
        }
    }

    let content = fs::read(proc_path.join("cmdline"))?;
    content
        .split(|&b| b == 0u8)
        .find(|s| !s.is_empty())
        .and_then(|first| {
            let first = String::from_utf8_lossy(first);
            Path::new(first.as_ref())
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .ok_or_else(|| io::Error::other("no name in comm or cmdline"))
}

/// Reads the full command line, NUL separators replaced by spaces.
///
/// Kernel threads have an empty cmdline, which is returned as an empty string.
pub fn read_cmdline(proc_path: &Path) -> io::Result<String> {
    let content = fs::read(proc_path.join("cmdline"))?;
    let joined = content
        .split(|&b| b == 0u8)
        .filter(|s| !s.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(joined)
}

/// Reads the scheduler state from /proc/<pid>/stat as a word.
pub fn read_status(proc_path: &Path) -> io::Result<String> {
    let content = fs::read_to_string(proc_path.join("stat"))?;
    let state = stat_state_char(&content)
        .ok_or_else(|| io::Error::other("Invalid stat format"))?;
    Ok(status_word(state))
}

/// Extracts the state character that follows the parenthesised comm.
///
/// comm may itself contain spaces and parentheses, so the last `)` is used.
pub(crate) fn stat_state_char(stat: &str) -> Option<char> {
    let close = stat.rfind(')')?;
    stat[close + 1..].trim_start().chars().next()
}

/// Returns the fields after the comm, starting with the state (field 3).
pub(crate) fn stat_fields_after_comm(stat: &str) -> Option<Vec<&str>> {
    let close = stat.rfind(')')?;
    Some(stat[close + 1..].split_whitespace().collect())
}

fn status_word(state: char) -> String {
    match state {
        'R' => "running",
        'S' => "sleeping",
        'D' => "disk-sleep",
        'T' => "stopped",
        't' => "tracing-stop",
        'Z' => "zombie",
        'X' | 'x' => "dead",
        'I' => "idle",
        'W' => "paging",
        'P' => "parked",
        'K' => "wakekill",
        other => return other.to_string(),
    }
    .to_string()
}
