//! Read-side views served by the engine.
//!
//! Every view is derived from a single snapshot, so the fields of one view
//! are always mutually consistent. Field names are snake_case on the wire.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::ToolAggregate;
use crate::configured::ConfiguredTool;
use crate::poller::PollerPhase;
use crate::sampler::ProcessRecord;
use crate::scenarios;
use crate::snapshot::SystemSnapshot;
use crate::taxonomy::{ToolFunction, ToolPlatform};

const UNKNOWN_SCENARIO_NAME: &str = "Unknown scenario";

// ═══════════════════════════════════════════════════════════════════════════════
// Running Tools
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningInstance {
    pub pid: u32,
    pub command_line: String,
    pub display_command: String,
    pub start_time: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
    pub resident_memory_bytes: u64,
}

impl RunningInstance {
    fn from_record(record: &ProcessRecord, now: DateTime<Utc>) -> Self {
        Self {
            pid: record.pid,
            command_line: record.command_line.clone(),
            display_command: record.display_command(),
            start_time: record.start_time,
            started_at: record.started_at(),
            uptime_secs: record.uptime_secs(now),
            resident_memory_bytes: record.resident_memory_bytes,
        }
    }
}

/// One running tool: descriptor, totals and the representative (oldest)
/// instance's summary fields, followed by every instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningTool {
    pub tool_id: String,
    pub display_name: String,
    pub category: String,
    pub description: String,
    pub functions: Vec<ToolFunction>,
    pub total_function_count: usize,
    pub platforms: Vec<ToolPlatform>,
    pub instance_count: usize,
    pub total_memory_bytes: u64,
    pub pid: u32,
    pub display_command: String,
    pub start_time: u64,
    pub uptime_secs: u64,
    pub instances: Vec<RunningInstance>,
}

impl RunningTool {
    pub fn from_aggregate(aggregate: &ToolAggregate, now: DateTime<Utc>) -> Self {
        let instances: Vec<RunningInstance> = aggregate
            .instances
            .iter()
            .map(|record| RunningInstance::from_record(record, now))
            .collect();
        let representative = aggregate.representative();
        let descriptor = &aggregate.descriptor;

        Self {
            tool_id: aggregate.tool_id.clone(),
            display_name: descriptor.display_name.clone(),
            category: descriptor.category.clone(),
            description: descriptor.description.clone(),
            functions: descriptor.functions.clone(),
            total_function_count: descriptor.total_function_count,
            platforms: descriptor.platforms.clone(),
            instance_count: aggregate.instance_count,
            total_memory_bytes: aggregate.total_memory_bytes,
            pid: representative.pid,
            display_command: representative.display_command(),
            start_time: representative.start_time,
            uptime_secs: representative.uptime_secs(now),
            instances,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningToolsView {
    pub tools: Vec<RunningTool>,
    pub count: usize,
    pub last_update: Option<DateTime<Utc>>,
}

impl RunningToolsView {
    pub fn from_snapshot(snapshot: &SystemSnapshot, now: DateTime<Utc>) -> Self {
        let tools: Vec<RunningTool> = snapshot
            .running
            .values()
            .map(|aggregate| RunningTool::from_aggregate(aggregate, now))
            .collect();
        Self {
            count: tools.len(),
            tools,
            last_update: snapshot.captured_at,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configured Tools
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfiguredToolsView {
    pub tools: Vec<ConfiguredTool>,
    pub count: usize,
}

impl ConfiguredToolsView {
    pub fn from_snapshot(snapshot: &SystemSnapshot) -> Self {
        Self {
            tools: snapshot.configured_tools.clone(),
            count: snapshot.configured_tools.len(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Overview
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub running: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub running_count: usize,
    pub configured_count: usize,
    pub unclassified_count: usize,
    pub per_category_counts: BTreeMap<String, CategoryCounts>,
    /// Resident memory summed over every instance of every running tool,
    /// not just representatives. Unclassified processes are excluded.
    pub total_memory_bytes: u64,
    pub health_status: HealthStatus,
    pub last_update: Option<DateTime<Utc>>,
}

impl Overview {
    /// `running` counts running tools per category; `total` counts configured
    /// tools per category, raised to `running` when a tool runs without being
    /// configured.
    pub fn from_snapshot(snapshot: &SystemSnapshot) -> Self {
        let mut per_category: BTreeMap<String, CategoryCounts> = BTreeMap::new();
        for tool in &snapshot.configured_tools {
            per_category.entry(tool.category.clone()).or_default().total += 1;
        }
        for aggregate in snapshot.running.values() {
            per_category
                .entry(aggregate.descriptor.category.clone())
                .or_default()
                .running += 1;
        }
        for counts in per_category.values_mut() {
            counts.total = counts.total.max(counts.running);
        }

        let running_count = snapshot.running.len();
        Self {
            running_count,
            configured_count: snapshot.configured_tools.len(),
            unclassified_count: snapshot.unclassified_count,
            per_category_counts: per_category,
            total_memory_bytes: snapshot.total_memory_bytes(),
            health_status: if running_count > 0 {
                HealthStatus::Healthy
            } else {
                HealthStatus::Warning
            },
            last_update: snapshot.captured_at,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentScenario {
    pub scenario_id: String,
    pub name: String,
    pub expected_tool_count: u32,
    pub last_switch_timestamp: Option<DateTime<Utc>>,
}

impl CurrentScenario {
    pub fn new(scenario_id: String, last_switch_timestamp: Option<DateTime<Utc>>) -> Self {
        let (name, expected_tool_count) = match scenarios::lookup(&scenario_id) {
            Some(descriptor) => (descriptor.display_name.clone(), descriptor.expected_tool_count),
            None => (UNKNOWN_SCENARIO_NAME.to_string(), 0),
        };
        Self {
            scenario_id,
            name,
            expected_tool_count,
            last_switch_timestamp,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub running_count: usize,
    pub configured_count: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub generation: u64,
    pub poller_phase: Option<PollerPhase>,
}

impl HealthReport {
    pub fn from_snapshot(snapshot: &SystemSnapshot, poller_phase: Option<PollerPhase>) -> Self {
        Self {
            status: "ok".to_string(),
            running_count: snapshot.running.len(),
            configured_count: snapshot.configured_tools.len(),
            last_update: snapshot.captured_at,
            generation: snapshot.generation,
            poller_phase,
        }
    }
}
