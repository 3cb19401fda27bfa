//! Point-in-time reads of the OS process table.
//!
//! A [`ProcessSource`] produces raw records; [`ProcessSampler`] keeps only the
//! ones whose command line contains a marker substring. Processes that vanish
//! or can't be inspected mid-read are omitted, never reported as errors.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sysinfo::{ProcessRefreshKind, System, UpdateKind};

use crate::config::SamplerConfig;

const DISPLAY_COMMAND_MAX_CHARS: usize = 80;

/// One sampled process. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    /// Full command line; used for matching.
    pub command_line: String,
    /// Unix timestamp (seconds).
    pub start_time: u64,
    pub resident_memory_bytes: u64,
}

impl ProcessRecord {
    /// Command line shortened for display: 80 characters, then `...`.
    pub fn display_command(&self) -> String {
        if self.command_line.chars().count() > DISPLAY_COMMAND_MAX_CHARS {
            let truncated: String = self
                .command_line
                .chars()
                .take(DISPLAY_COMMAND_MAX_CHARS)
                .collect();
            format!("{}...", truncated)
        } else {
            self.command_line.clone()
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.start_time as i64, 0).single()
    }

    /// Seconds the process has been running as of `now` (0 if clocks disagree).
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> u64 {
        let now_secs = now.timestamp().max(0) as u64;
        now_secs.saturating_sub(self.start_time)
    }
}

/// Source of raw process records.
///
/// Implementations must not block indefinitely and must skip (not fail on)
/// processes that exit or deny access while being read.
pub trait ProcessSource: Send {
    fn read_table(&mut self) -> Vec<ProcessRecord>;
}

/// Builds a record from one process-table row.
///
/// Rows without a command line (kernel threads, processes we may not
/// inspect) yield `None`.
fn record_from_parts(
    pid: u32,
    cmd: &[String],
    start_time: u64,
    resident_memory_bytes: u64,
) -> Option<ProcessRecord> {
    if cmd.is_empty() {
        tracing::trace!(pid, "Skipping process without command line");
        return None;
    }
    Some(ProcessRecord {
        pid,
        command_line: cmd.join(" "),
        start_time,
        resident_memory_bytes,
    })
}

/// Reads the live process table through `sysinfo`.
///
/// The `System` is kept between reads so refreshes only touch what changed.
pub struct SysinfoProcessSource {
    system: System,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoProcessSource {
    fn read_table(&mut self) -> Vec<ProcessRecord> {
        self.system.refresh_processes_specifics(
            ProcessRefreshKind::new()
                .with_cmd(UpdateKind::Always)
                .with_memory(),
        );

        self.system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                record_from_parts(
                    pid.as_u32(),
                    process.cmd(),
                    process.start_time(),
                    process.memory(),
                )
            })
            .collect()
    }
}

pub struct ProcessSampler {
    source: Box<dyn ProcessSource>,
    markers: Vec<String>,
}

impl ProcessSampler {
    pub fn new(source: Box<dyn ProcessSource>, config: &SamplerConfig) -> Self {
        Self {
            source,
            markers: config
                .markers
                .iter()
                .map(|marker| marker.to_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
        }
    }

    /// Returns tool-related processes ordered by pid.
    pub fn sample(&mut self) -> Vec<ProcessRecord> {
        let mut records: Vec<ProcessRecord> = self
            .source
            .read_table()
            .into_iter()
            .filter(|record| self.is_tool_related(&record.command_line))
            .collect();
        records.sort_by_key(|record| record.pid);
        records
    }

    fn is_tool_related(&self, command_line: &str) -> bool {
        let lowered = command_line.to_lowercase();
        self.markers.iter().any(|marker| lowered.contains(marker))
    }
}
