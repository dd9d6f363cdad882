use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorStats;
use crate::errors::ErrorStats;
use crate::network::NetworkStats;
use crate::performance::PerformanceMetrics;
use crate::resource::{group_warnings, ResourceStats, TypeStats, WarningGroup};

/// Resource stats without the raw warning list, which would otherwise be
/// duplicated into every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRollup {
    pub total_resources: u64,
    pub total_size: u64,
    pub average_size: f64,
    pub average_duration: f64,
    pub by_type: BTreeMap<String, TypeStats>,
    pub warning_count: u64,
    pub warning_groups: Vec<WarningGroup>,
}

impl From<ResourceStats> for ResourceRollup {
    fn from(stats: ResourceStats) -> Self {
        Self {
            total_resources: stats.total_resources,
            total_size: stats.total_size,
            average_size: stats.average_size,
            average_duration: stats.average_duration,
            by_type: stats.by_type,
            warning_count: stats.warnings.len() as u64,
            warning_groups: group_warnings(&stats.warnings),
        }
    }
}

/// Rollup of every collector at one instant. Never modified after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: i64,
    pub performance: PerformanceMetrics,
    pub resources: ResourceRollup,
    pub network: NetworkStats,
    pub behavior: BehaviorStats,
    pub errors: ErrorStats,
}
