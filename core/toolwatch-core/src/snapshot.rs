//! The latest complete view of the system, shared between the poller and readers.
//!
//! Snapshots are immutable once built. Publishing swaps one `Arc` for another
//! under a write lock held only for the swap, so a reader sees either the old
//! snapshot or the new one, never a mixture.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::aggregate::ToolAggregate;
use crate::configured::ConfiguredTool;
use crate::scenarios::UNKNOWN_SCENARIO_ID;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemSnapshot {
    /// 0 for the startup placeholder; increases by one per publish.
    pub generation: u64,
    pub running: BTreeMap<String, ToolAggregate>,
    pub unclassified_count: usize,
    pub configured_tools: Vec<ConfiguredTool>,
    pub active_scenario_id: String,
    /// When the cycle began reading; `None` until the first cycle completes.
    pub captured_at: Option<DateTime<Utc>>,
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            running: BTreeMap::new(),
            unclassified_count: 0,
            configured_tools: Vec::new(),
            active_scenario_id: UNKNOWN_SCENARIO_ID.to_string(),
            captured_at: None,
        }
    }
}

impl SystemSnapshot {
    pub fn total_memory_bytes(&self) -> u64 {
        self.running
            .values()
            .map(|aggregate| aggregate.total_memory_bytes)
            .sum()
    }
}

/// Single-writer, many-reader holder of the current snapshot.
pub struct SnapshotStore {
    current: RwLock<Arc<SystemSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(SystemSnapshot::default())),
        }
    }

    /// Replaces the current snapshot. Called only by the poller.
    pub fn publish(&self, snapshot: SystemSnapshot) {
        let next = Arc::new(snapshot);
        // Recover from poisoning - the slot only ever holds complete snapshots
        let mut slot = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = next;
    }

    pub fn current(&self) -> Arc<SystemSnapshot> {
        let slot = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&slot)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
