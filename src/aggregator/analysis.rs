use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::snapshot::Snapshot;
use crate::behavior::TargetCount;
use crate::config::PerformanceThresholds;
use crate::errors::MessageCount;
use crate::performance::analytics::{classify_trend, mean};
use crate::performance::{analyze, PerformanceAnalytics, PerformanceMetrics, Trend};

const TOP_RESOURCE_TYPES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeTiming {
    pub initiator_type: String,
    pub average_duration: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnalysis {
    pub analytics: PerformanceAnalytics,
    pub average_response_time_ms: f64,
    pub peak_memory_usage_percent: Option<f64>,
    pub total_slow_requests: u64,
    pub resource_warning_count: u64,
    pub slowest_resource_types: Vec<ResourceTypeTiming>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBehaviorAnalysis {
    pub total_events: u64,
    pub events_by_type: BTreeMap<String, u64>,
    pub top_targets: Vec<TargetCount>,
    /// New events per snapshot interval across the retained history.
    pub average_events_per_interval: f64,
    pub flushed: u64,
    pub failed_flushes: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnalysis {
    pub total_errors: u64,
    pub errors_by_type: BTreeMap<String, u64>,
    pub top_messages: Vec<MessageCount>,
    pub average_errors_per_interval: f64,
    pub error_trend: Trend,
    pub average_network_error_rate: f64,
}

pub fn performance_analysis(
    history: &[Snapshot],
    thresholds: &PerformanceThresholds,
) -> Option<PerformanceAnalysis> {
    let latest = history.last()?;
    let metrics: Vec<PerformanceMetrics> = history.iter().map(|s| s.performance.clone()).collect();
    let analytics = analyze(&metrics, thresholds)?;

    let response_times: Vec<f64> = history
        .iter()
        .filter(|s| s.network.success_count + s.network.error_count > 0)
        .map(|s| s.network.average_response_time_ms)
        .collect();

    let peak_memory_usage_percent = history
        .iter()
        .filter_map(|s| s.performance.memory_usage_percent)
        .fold(None, |peak: Option<f64>, v| Some(peak.map_or(v, |p| p.max(v))));

    let mut slowest: Vec<ResourceTypeTiming> = latest
        .resources
        .by_type
        .iter()
        .map(|(kind, stats)| ResourceTypeTiming {
            initiator_type: kind.clone(),
            average_duration: stats.average_duration,
            count: stats.count,
        })
        .collect();
    slowest.sort_by(|a, b| b.average_duration.total_cmp(&a.average_duration));
    slowest.truncate(TOP_RESOURCE_TYPES);

    Some(PerformanceAnalysis {
        analytics,
        average_response_time_ms: mean(&response_times),
        peak_memory_usage_percent,
        total_slow_requests: latest.network.slow_requests,
        resource_warning_count: latest.resources.warning_count,
        slowest_resource_types: slowest,
    })
}

pub fn behavior_analysis(history: &[Snapshot]) -> Option<UserBehaviorAnalysis> {
    let first = history.first()?;
    let latest = history.last()?;

    Some(UserBehaviorAnalysis {
        total_events: latest.behavior.total_events,
        events_by_type: latest.behavior.events_by_type.clone(),
        top_targets: latest.behavior.top_targets.clone(),
        average_events_per_interval: per_interval(
            first.behavior.total_events,
            latest.behavior.total_events,
            history.len(),
        ),
        flushed: latest.behavior.flushed,
        failed_flushes: latest.behavior.failed_flushes,
        dropped: latest.behavior.dropped,
    })
}

pub fn error_analysis(history: &[Snapshot]) -> Option<ErrorAnalysis> {
    let first = history.first()?;
    let latest = history.last()?;

    // Per-interval increments of the cumulative error counter.
    let increments: Vec<f64> = history
        .windows(2)
        .map(|w| w[1].errors.total_errors.saturating_sub(w[0].errors.total_errors) as f64)
        .collect();
    let network_error_rates: Vec<f64> = history.iter().map(|s| s.network.error_rate).collect();

    Some(ErrorAnalysis {
        total_errors: latest.errors.total_errors,
        errors_by_type: latest.errors.by_type.clone(),
        top_messages: latest.errors.top_messages.clone(),
        average_errors_per_interval: per_interval(
            first.errors.total_errors,
            latest.errors.total_errors,
            history.len(),
        ),
        error_trend: classify_trend(&increments, false),
        average_network_error_rate: mean(&network_error_rates),
    })
}

/// Growth of a cumulative counter per interval. A single snapshot counts as
/// one interval holding everything seen so far.
fn per_interval(first: u64, last: u64, samples: usize) -> f64 {
    if samples < 2 {
        return last as f64;
    }
    last.saturating_sub(first) as f64 / (samples - 1) as f64
}
