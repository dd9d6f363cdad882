//! Recognized options for every collector.
//!
//! All values are supplied at construction. Nothing in the collectors reads a
//! hard-coded threshold; the defaults below are only what an empty config
//! document deserializes to.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            retryable_status_codes: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Delay before retry number `attempt` (zero based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    pub sample_rate: f64,
    pub slow_threshold_ms: u64,
    pub ignore_patterns: Vec<String>,
    pub retry_policy: RetryPolicy,
    pub max_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            slow_threshold_ms: 3000,
            ignore_patterns: Vec::new(),
            retry_policy: RetryPolicy::default(),
            max_buffer_size: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceConfig {
    pub allowed_types: Vec<String>,
    pub ignore_patterns: Vec<String>,
    /// Transfer size thresholds in bytes, keyed by initiator type. A
    /// supplied map is layered over the defaults, not substituted for them.
    #[serde(deserialize_with = "merge_thresholds")]
    pub thresholds: BTreeMap<String, u64>,
    /// Applied to initiator types without an entry in `thresholds`.
    pub default_size_threshold: u64,
    pub timeout_ms: f64,
    pub max_buffer_size: usize,
}

fn default_thresholds() -> BTreeMap<String, u64> {
    [
        ("script", 500 * 1024),
        ("css", 100 * 1024),
        ("link", 100 * 1024),
        ("img", 1024 * 1024),
        ("font", 200 * 1024),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn merge_thresholds<'de, D>(deserializer: D) -> Result<BTreeMap<String, u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let overrides = BTreeMap::<String, u64>::deserialize(deserializer)?;
    let mut thresholds = default_thresholds();
    thresholds.extend(overrides);
    Ok(thresholds)
}

impl Default for ResourceConfig {
    fn default() -> Self {
        let thresholds = default_thresholds();

        Self {
            allowed_types: ["script", "link", "css", "img", "font", "fetch", "xmlhttprequest"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_patterns: Vec::new(),
            thresholds,
            default_size_threshold: 1024 * 1024,
            timeout_ms: 3000.0,
            max_buffer_size: 1000,
        }
    }
}

impl ResourceConfig {
    pub fn size_threshold(&self, initiator_type: &str) -> u64 {
        self.thresholds
            .get(initiator_type)
            .copied()
            .unwrap_or(self.default_size_threshold)
    }
}

/// Thresholds used by the recommendation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceThresholds {
    pub first_paint_ms: f64,
    pub largest_contentful_paint_ms: f64,
    pub first_input_delay_ms: f64,
    pub cumulative_layout_shift: f64,
    pub time_to_first_byte_ms: f64,
    pub memory_usage_percent: f64,
    pub min_fps: f64,
    pub script_time_ms: f64,
    pub layout_time_ms: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            first_paint_ms: 1800.0,
            largest_contentful_paint_ms: 2500.0,
            first_input_delay_ms: 100.0,
            cumulative_layout_shift: 0.1,
            time_to_first_byte_ms: 600.0,
            memory_usage_percent: 80.0,
            min_fps: 30.0,
            script_time_ms: 1000.0,
            layout_time_ms: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceConfig {
    pub sample_interval_ms: u64,
    pub thresholds: PerformanceThresholds,
    pub max_buffer_size: usize,
    /// Post each sampled metrics snapshot to the performance endpoint.
    pub report: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 5000,
            thresholds: PerformanceThresholds::default(),
            max_buffer_size: 500,
            report: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorConfig {
    pub sample_rate: f64,
    pub sensitive_fields: Vec<String>,
    pub dedupe_interval_ms: u64,
    /// Buffer length that triggers an immediate flush.
    pub batch_size: usize,
    /// Hard cap on buffered records; oldest are dropped beyond it.
    pub max_buffer_size: usize,
    pub flush_interval_ms: u64,
    pub opt_out_attribute: String,
    pub excluded_tags: Vec<String>,
    pub ignore_patterns: Vec<String>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            sensitive_fields: ["password", "token", "secret", "credit_card", "card_number", "cvv", "ssn"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            dedupe_interval_ms: 300,
            batch_size: 20,
            max_buffer_size: 500,
            flush_interval_ms: 10_000,
            opt_out_attribute: "data-no-track".to_string(),
            excluded_tags: ["html", "body", "head", "script", "style", "meta", "br", "hr"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorConfig {
    pub sample_rate: f64,
    pub ignore_patterns: Vec<String>,
    pub max_buffer_size: usize,
    pub report: bool,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            ignore_patterns: Vec::new(),
            max_buffer_size: 100,
            report: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregatorConfig {
    pub interval_ms: u64,
    pub max_data_points: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            max_data_points: 1000,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("aggregator.maxDataPoints", self.max_data_points)?;
        check_positive("aggregator.intervalMs", self.interval_ms as usize)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointConfig {
    pub errors: String,
    pub behavior: String,
    pub performance: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            errors: "http://localhost:3000/api/monitoring/errors".to_string(),
            behavior: "http://localhost:3000/api/monitoring/behavior".to_string(),
            performance: "http://localhost:3000/api/monitoring/performance".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryConfig {
    pub endpoints: EndpointConfig,
    pub network: NetworkConfig,
    pub resources: ResourceConfig,
    pub performance: PerformanceConfig,
    pub behavior: BehaviorConfig,
    pub errors: ErrorConfig,
    pub aggregator: AggregatorConfig,
}

impl TelemetryConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("network.sampleRate", self.network.sample_rate)?;
        check_rate("behavior.sampleRate", self.behavior.sample_rate)?;
        check_rate("errors.sampleRate", self.errors.sample_rate)?;

        check_positive("network.maxBufferSize", self.network.max_buffer_size)?;
        check_positive("resources.maxBufferSize", self.resources.max_buffer_size)?;
        check_positive("performance.maxBufferSize", self.performance.max_buffer_size)?;
        check_positive("behavior.maxBufferSize", self.behavior.max_buffer_size)?;
        check_positive("behavior.batchSize", self.behavior.batch_size)?;
        check_positive("errors.maxBufferSize", self.errors.max_buffer_size)?;
        self.aggregator.validate()?;

        check_positive("performance.sampleIntervalMs", self.performance.sample_interval_ms as usize)?;
        check_positive("behavior.flushIntervalMs", self.behavior.flush_interval_ms as usize)?;
        Ok(())
    }
}

fn check_rate(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{} is outside [0, 1]", value),
        });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
