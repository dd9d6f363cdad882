//! Statistics over retained metric history: averages, two-bucket trends,
//! 2σ outliers and threshold-based recommendations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::PerformanceMetrics;
use crate::config::PerformanceThresholds;

const TREND_TOLERANCE: f64 = 0.05;
const ANOMALY_SIGMAS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub metric: String,
    /// Position of the sample in the analyzed history.
    pub index: usize,
    pub value: f64,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnalytics {
    pub sample_count: usize,
    pub averages: BTreeMap<String, f64>,
    pub trends: BTreeMap<String, Trend>,
    pub anomalies: Vec<Anomaly>,
    pub recommendations: Vec<String>,
}

struct MetricDef {
    name: &'static str,
    extract: fn(&PerformanceMetrics) -> Option<f64>,
    higher_is_better: bool,
}

const METRICS: &[MetricDef] = &[
    MetricDef { name: "firstPaint", extract: |m| m.first_paint, higher_is_better: false },
    MetricDef { name: "firstContentfulPaint", extract: |m| m.first_contentful_paint, higher_is_better: false },
    MetricDef { name: "largestContentfulPaint", extract: |m| m.largest_contentful_paint, higher_is_better: false },
    MetricDef { name: "firstInputDelay", extract: |m| m.first_input_delay, higher_is_better: false },
    MetricDef { name: "cumulativeLayoutShift", extract: |m| m.cumulative_layout_shift, higher_is_better: false },
    MetricDef { name: "timeToFirstByte", extract: |m| m.time_to_first_byte, higher_is_better: false },
    MetricDef { name: "memoryUsagePercent", extract: |m| m.memory_usage_percent, higher_is_better: false },
    MetricDef { name: "fps", extract: |m| m.fps, higher_is_better: true },
    MetricDef { name: "scriptTimeMs", extract: |m| Some(m.script_time_ms), higher_is_better: false },
    MetricDef { name: "layoutTimeMs", extract: |m| Some(m.layout_time_ms), higher_is_better: false },
    MetricDef { name: "paintTimeMs", extract: |m| Some(m.paint_time_ms), higher_is_better: false },
];

/// Returns `None` for an empty history.
pub fn analyze(history: &[PerformanceMetrics], thresholds: &PerformanceThresholds) -> Option<PerformanceAnalytics> {
    if history.is_empty() {
        return None;
    }

    let mut analytics = PerformanceAnalytics {
        sample_count: history.len(),
        averages: BTreeMap::new(),
        trends: BTreeMap::new(),
        anomalies: Vec::new(),
        recommendations: Vec::new(),
    };

    for def in METRICS {
        // Keep the history index so anomalies point at the right sample.
        let series: Vec<(usize, f64)> = history
            .iter()
            .enumerate()
            .filter_map(|(i, m)| (def.extract)(m).map(|v| (i, v)))
            .collect();
        if series.is_empty() {
            continue;
        }
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

        let avg = mean(&values);
        analytics.averages.insert(def.name.to_string(), avg);
        analytics
            .trends
            .insert(def.name.to_string(), classify_trend(&values, def.higher_is_better));

        let sd = std_dev(&values, avg);
        if sd > 0.0 {
            for (index, value) in &series {
                if (value - avg).abs() > ANOMALY_SIGMAS * sd {
                    analytics.anomalies.push(Anomaly {
                        metric: def.name.to_string(),
                        index: *index,
                        value: *value,
                        mean: avg,
                        std_dev: sd,
                    });
                }
            }
        }
    }

    analytics.recommendations = recommend(&analytics.averages, thresholds);
    Some(analytics)
}

/// Compares the mean of the second half against the first half.
/// A change beyond ±5% in the worse direction is degrading.
pub fn classify_trend(values: &[f64], higher_is_better: bool) -> Trend {
    if values.len() < 2 {
        return Trend::Stable;
    }
    let (first, second) = values.split_at(values.len() / 2);
    let first_mean = mean(first);
    let second_mean = mean(second);
    if first_mean.abs() < f64::EPSILON {
        return Trend::Stable;
    }

    let mut change = (second_mean - first_mean) / first_mean.abs();
    if higher_is_better {
        change = -change;
    }

    if change > TREND_TOLERANCE {
        Trend::Degrading
    } else if change < -TREND_TOLERANCE {
        Trend::Improving
    } else {
        Trend::Stable
    }
}

fn recommend(averages: &BTreeMap<String, f64>, t: &PerformanceThresholds) -> Vec<String> {
    let above = |name: &str, limit: f64| averages.get(name).is_some_and(|v| *v > limit);
    let below = |name: &str, limit: f64| averages.get(name).is_some_and(|v| *v < limit);

    let mut out = Vec::new();
    if above("firstPaint", t.first_paint_ms) {
        out.push("First paint is slow; inline critical CSS and defer non-critical scripts".to_string());
    }
    if above("largestContentfulPaint", t.largest_contentful_paint_ms) {
        out.push("Largest contentful paint is slow; optimize hero images and preload key resources".to_string());
    }
    if above("firstInputDelay", t.first_input_delay_ms) {
        out.push("First input delay is high; break up long tasks on the main thread".to_string());
    }
    if above("cumulativeLayoutShift", t.cumulative_layout_shift) {
        out.push("Layout shift is high; reserve space for images and dynamic content".to_string());
    }
    if above("timeToFirstByte", t.time_to_first_byte_ms) {
        out.push("Time to first byte is high; review server response time and caching".to_string());
    }
    if above("memoryUsagePercent", t.memory_usage_percent) {
        out.push("Memory usage is high; look for leaked listeners and oversized caches".to_string());
    }
    if below("fps", t.min_fps) {
        out.push("Frame rate is low; reduce animation work and expensive repaints".to_string());
    }
    if above("scriptTimeMs", t.script_time_ms) {
        out.push("Script execution time is high; split bundles and defer heavy computation".to_string());
    }
    if above("layoutTimeMs", t.layout_time_ms) {
        out.push("Layout time is high; avoid forced synchronous layouts".to_string());
    }
    out
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
