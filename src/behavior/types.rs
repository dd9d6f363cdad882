use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::platform::EventKind;

/// A sampled, redacted interaction ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActionRecord {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub target: String,
    pub timestamp: i64,
    pub url: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCount {
    pub target: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorStats {
    pub total_events: u64,
    pub events_by_type: BTreeMap<String, u64>,
    pub top_targets: Vec<TargetCount>,
    pub buffered: u64,
    pub flushed: u64,
    pub failed_flushes: u64,
    pub dropped: u64,
}

/// Sorted by descending count, ties broken by target name.
pub fn top_n(counts: impl IntoIterator<Item = (String, u64)>, n: usize) -> Vec<TargetCount> {
    let mut entries: Vec<TargetCount> = counts
        .into_iter()
        .map(|(target, count)| TargetCount { target, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.target.cmp(&b.target)));
    entries.truncate(n);
    entries
}
