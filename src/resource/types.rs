use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A completed resource load as reported by the host. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTimingRecord {
    pub name: String,
    pub initiator_type: String,
    pub start_time: f64,
    pub duration: f64,
    pub transfer_size: u64,
    pub decoded_body_size: u64,
    pub encoded_body_size: u64,
}

impl ResourceTimingRecord {
    /// Both sizes zero means nothing arrived; treated as a failed load.
    pub fn looks_failed(&self) -> bool {
        self.transfer_size == 0 && self.decoded_body_size == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    Size,
    Performance,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub resource: String,
    pub message: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStats {
    pub count: u64,
    pub total_size: u64,
    pub average_size: f64,
    pub total_duration: f64,
    pub average_duration: f64,
    pub total_encoded_size: u64,
    pub total_decoded_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub total_resources: u64,
    pub total_size: u64,
    pub average_size: f64,
    pub average_duration: f64,
    pub by_type: BTreeMap<String, TypeStats>,
    pub warnings: Vec<ResourceWarning>,
}

pub fn compute_stats(records: &[ResourceTimingRecord], warnings: &[ResourceWarning]) -> ResourceStats {
    let mut stats = ResourceStats {
        total_resources: records.len() as u64,
        warnings: warnings.to_vec(),
        ..ResourceStats::default()
    };

    let mut total_duration = 0.0;
    for record in records {
        stats.total_size += record.transfer_size;
        total_duration += record.duration;

        let entry = stats.by_type.entry(record.initiator_type.clone()).or_default();
        entry.count += 1;
        entry.total_size += record.transfer_size;
        entry.total_duration += record.duration;
        entry.total_encoded_size += record.encoded_body_size;
        entry.total_decoded_size += record.decoded_body_size;
    }

    for entry in stats.by_type.values_mut() {
        entry.average_size = entry.total_size as f64 / entry.count as f64;
        entry.average_duration = entry.total_duration / entry.count as f64;
    }

    if stats.total_resources > 0 {
        stats.average_size = stats.total_size as f64 / stats.total_resources as f64;
        stats.average_duration = total_duration / stats.total_resources as f64;
    }

    stats
}

/// Warnings collapsed by (type, message, resource), in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningGroup {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub resource: String,
    pub message: String,
    pub count: u64,
}

pub fn group_warnings(warnings: &[ResourceWarning]) -> Vec<WarningGroup> {
    let mut groups: Vec<WarningGroup> = Vec::new();
    for warning in warnings {
        let existing = groups.iter_mut().find(|g| {
            g.kind == warning.kind && g.message == warning.message && g.resource == warning.resource
        });
        match existing {
            Some(group) => group.count += 1,
            None => groups.push(WarningGroup {
                kind: warning.kind,
                resource: warning.resource.clone(),
                message: warning.message.clone(),
                count: 1,
            }),
        }
    }
    groups
}
