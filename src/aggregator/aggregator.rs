use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::analysis::{
    behavior_analysis, error_analysis, performance_analysis, ErrorAnalysis, PerformanceAnalysis,
    UserBehaviorAnalysis,
};
use super::snapshot::Snapshot;
use crate::behavior::UserBehaviorTracker;
use crate::collector::{cadence, guarded, now_millis, BoundedPush, Collector, Lifecycle};
use crate::config::{AggregatorConfig, PerformanceThresholds, TelemetryConfig};
use crate::error::{ConfigError, ExportError};
use crate::errors::ErrorMonitor;
use crate::export::{export, DataType, ExportBundle, ExportFile, ExportFormat};
use crate::network::{HttpPipeline, NetworkMonitor};
use crate::performance::PerformanceCollector;
use crate::platform::{Document, PerformanceTimeline};
use crate::resource::ResourceMonitor;
use crate::services::report::Reporter;

/// Every collector the aggregator drives, built once at the composition root.
#[derive(Clone)]
pub struct Collectors {
    pub network: Arc<NetworkMonitor>,
    pub resources: Arc<ResourceMonitor>,
    pub performance: Arc<PerformanceCollector>,
    pub behavior: Arc<UserBehaviorTracker>,
    pub errors: Arc<ErrorMonitor>,
}

impl Collectors {
    /// Validates `config` before anything is built; a rejected option never
    /// reaches a running timer.
    pub fn from_config(
        config: &TelemetryConfig,
        pipeline: Arc<HttpPipeline>,
        timeline: Arc<dyn PerformanceTimeline>,
        document: Arc<Document>,
        reporter: Arc<dyn Reporter>,
        session_id: &str,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            network: Arc::new(NetworkMonitor::new(config.network.clone(), pipeline)),
            resources: Arc::new(ResourceMonitor::new(config.resources.clone(), timeline.clone())),
            performance: Arc::new(PerformanceCollector::new(
                config.performance.clone(),
                timeline,
                reporter.clone(),
                config.endpoints.performance.clone(),
            )),
            behavior: Arc::new(UserBehaviorTracker::new(
                config.behavior.clone(),
                document,
                reporter.clone(),
                config.endpoints.behavior.clone(),
                session_id,
            )),
            errors: Arc::new(ErrorMonitor::new(
                config.errors.clone(),
                reporter,
                config.endpoints.errors.clone(),
                session_id,
            )),
        })
    }

    /// The collectors with a start/stop lifecycle. The error monitor is
    /// process-lifetime and registers separately.
    fn lifecycled(&self) -> [&dyn Collector; 4] {
        [
            self.network.as_ref(),
            self.resources.as_ref(),
            self.performance.as_ref(),
            self.behavior.as_ref(),
        ]
    }
}

pub struct Aggregator {
    config: AggregatorConfig,
    thresholds: PerformanceThresholds,
    collectors: Collectors,
    history: Mutex<VecDeque<Snapshot>>,
    lifecycle: Lifecycle,
}

impl Aggregator {
    pub fn new(
        config: AggregatorConfig,
        thresholds: PerformanceThresholds,
        collectors: Collectors,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            thresholds,
            collectors,
            history: Mutex::new(VecDeque::new()),
            lifecycle: Lifecycle::new(),
        })
    }

    pub fn collectors(&self) -> &Collectors {
        &self.collectors
    }

    /// Starts every collector and the snapshot timer. No-op when running.
    pub fn start(self: &Arc<Self>) {
        let Some(token) = self.lifecycle.begin() else {
            return;
        };

        self.collectors.errors.register();
        for collector in self.collectors.lifecycled() {
            collector.start();
        }

        let aggregator = Arc::downgrade(self);
        let period = Duration::from_millis(self.config.interval_ms);
        let task = tokio::spawn(async move {
            let mut ticker = cadence(period).await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(strong) = aggregator.upgrade() else { break };
                        guarded("aggregator", || strong.capture());
                    }
                }
            }
        });
        self.lifecycle.register(task);
        info!(interval_ms = self.config.interval_ms, "aggregator started");
    }

    /// Stops the timer and every collector. No-op when not running.
    pub fn stop(&self) {
        if !self.lifecycle.end() {
            return;
        }
        for collector in self.collectors.lifecycled() {
            collector.stop();
        }
        info!("aggregator stopped");
    }

    /// Stops everything, then delivers buffered behavior records with a
    /// blocking call.
    pub fn shutdown(&self) {
        self.stop();
        match self.collectors.behavior.flush_blocking() {
            Ok(sent) => info!(sent, "final behavior flush delivered"),
            Err(e) => warn!(error = %e, "final behavior flush failed"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn capture(&self) -> Snapshot {
        self.capture_at(now_millis())
    }

    /// Reads every collector into one snapshot and appends it to history.
    pub fn capture_at(&self, timestamp: i64) -> Snapshot {
        let snapshot = Snapshot {
            timestamp,
            performance: self.collectors.performance.metrics(),
            resources: self.collectors.resources.stats().into(),
            network: self.collectors.network.stats(),
            behavior: self.collectors.behavior.stats(),
            errors: self.collectors.errors.stats(),
        };

        let mut history = self.history.lock();
        history.push_bounded(snapshot.clone(), self.config.max_data_points);
        debug!(retained = history.len(), "snapshot captured");
        snapshot
    }

    /// Snapshots with `start <= timestamp <= end`; open bounds are unbounded.
    pub fn get_data(&self, start: Option<i64>, end: Option<i64>) -> Vec<Snapshot> {
        self.history
            .lock()
            .iter()
            .filter(|s| start.map_or(true, |t| s.timestamp >= t))
            .filter(|s| end.map_or(true, |t| s.timestamp <= t))
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.history.lock().back().cloned()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn get_performance_analysis(&self) -> Option<PerformanceAnalysis> {
        performance_analysis(&self.get_data(None, None), &self.thresholds)
    }

    pub fn get_user_behavior_analysis(&self) -> Option<UserBehaviorAnalysis> {
        behavior_analysis(&self.get_data(None, None))
    }

    pub fn get_error_analysis(&self) -> Option<ErrorAnalysis> {
        error_analysis(&self.get_data(None, None))
    }

    pub fn bundle(&self, types: &[DataType]) -> ExportBundle {
        let mut bundle = ExportBundle::default();
        for data_type in types {
            match data_type {
                DataType::Performance => {
                    let mut samples = self.collectors.performance.history();
                    if samples.is_empty() {
                        samples.push(self.collectors.performance.metrics());
                    }
                    bundle.performance = Some(samples);
                }
                DataType::Resources => {
                    bundle.resources = Some(self.collectors.resources.resource_timings());
                }
                DataType::Network => bundle.network = Some(self.collectors.network.requests()),
                DataType::Behavior => bundle.behavior = Some(self.collectors.behavior.events()),
                DataType::Errors => bundle.errors = Some(self.collectors.errors.errors()),
                DataType::Snapshots => bundle.snapshots = Some(self.get_data(None, None)),
            }
        }
        bundle
    }

    pub fn export(&self, types: &[DataType], format: ExportFormat) -> Result<ExportFile, ExportError> {
        export(&self.bundle(types), format, chrono::Local::now().naive_local())
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.stop();
    }
}
