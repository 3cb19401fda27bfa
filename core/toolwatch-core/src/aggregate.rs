//! Groups sampled processes into per-tool aggregates.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::classify::{classify, UNKNOWN_TOOL_ID};
use crate::sampler::ProcessRecord;
use crate::taxonomy::{self, ToolDescriptor};

/// All running instances of one tool.
///
/// Invariants (established by [`ToolAggregate::from_instances`]):
/// - `instances` is ordered by `start_time` ascending, ties in input order
/// - `instance_count == instances.len()`
/// - `total_memory_bytes` is the sum of instance memory
/// - `representative() == &instances[0]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolAggregate {
    pub tool_id: String,
    pub descriptor: ToolDescriptor,
    pub instances: Vec<ProcessRecord>,
    pub instance_count: usize,
    pub total_memory_bytes: u64,
}

impl ToolAggregate {
    /// Returns `None` for an empty group; an aggregate always has a
    /// representative.
    pub fn from_instances(
        descriptor: ToolDescriptor,
        mut instances: Vec<ProcessRecord>,
    ) -> Option<Self> {
        if instances.is_empty() {
            return None;
        }
        // Stable: equal start times keep sampler order.
        instances.sort_by_key(|record| record.start_time);
        let total_memory_bytes = instances
            .iter()
            .map(|record| record.resident_memory_bytes)
            .sum();

        Some(Self {
            tool_id: descriptor.id.clone(),
            descriptor,
            instance_count: instances.len(),
            total_memory_bytes,
            instances,
        })
    }

    /// The oldest instance.
    pub fn representative(&self) -> &ProcessRecord {
        &self.instances[0]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub aggregates: BTreeMap<String, ToolAggregate>,
    /// Marker-matching processes no rule recognized.
    pub unclassified_count: usize,
}

/// A sampled record paired with the tool id the classifier gave it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub tool_id: &'static str,
    pub record: ProcessRecord,
}

pub fn classify_records(records: Vec<ProcessRecord>) -> Vec<ClassifiedRecord> {
    records
        .into_iter()
        .map(|record| ClassifiedRecord {
            tool_id: classify(&record.command_line),
            record,
        })
        .collect()
}

/// Groups classified records by tool id. Input order is preserved within a
/// group before sorting, so start-time ties resolve to the earlier record.
pub fn aggregate_classified(classified: Vec<ClassifiedRecord>) -> AggregateReport {
    let mut groups: BTreeMap<&'static str, Vec<ProcessRecord>> = BTreeMap::new();
    let mut unclassified_count = 0;

    for ClassifiedRecord { tool_id, record } in classified {
        if tool_id == UNKNOWN_TOOL_ID {
            unclassified_count += 1;
            continue;
        }
        groups.entry(tool_id).or_default().push(record);
    }

    let aggregates = groups
        .into_iter()
        .filter_map(|(tool_id, instances)| {
            let Some(descriptor) = taxonomy::lookup(tool_id) else {
                tracing::warn!(tool_id, "Classifier produced id missing from taxonomy");
                return None;
            };
            ToolAggregate::from_instances(descriptor.clone(), instances)
                .map(|aggregate| (tool_id.to_string(), aggregate))
        })
        .collect();

    AggregateReport {
        aggregates,
        unclassified_count,
    }
}

pub fn aggregate(records: Vec<ProcessRecord>) -> AggregateReport {
    aggregate_classified(classify_records(records))
}
