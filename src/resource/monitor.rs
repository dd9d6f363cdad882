use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::suggestions::generate_suggestions;
use super::types::{compute_stats, ResourceStats, ResourceTimingRecord, ResourceWarning, WarningKind};
use crate::collector::{guarded, matches_any, BoundedPush, Collector, Lifecycle, TrackPolicy, Watermark};
use crate::config::ResourceConfig;
use crate::platform::{EntryKind, PerformanceEntry, PerformanceTimeline, TimelineRecord};

struct ResourceState {
    config: ResourceConfig,
    records: Mutex<VecDeque<ResourceTimingRecord>>,
    warnings: Mutex<VecDeque<ResourceWarning>>,
    consumed: Watermark,
}

impl TrackPolicy<ResourceTimingRecord> for ResourceState {
    fn should_track(&self, entry: &ResourceTimingRecord) -> bool {
        self.config.allowed_types.iter().any(|t| t == &entry.initiator_type)
            && !matches_any(&self.config.ignore_patterns, &entry.name)
    }
}

impl ResourceState {
    /// Entries are consumed at most once, across restarts.
    fn consume(&self, record: TimelineRecord) {
        if !self.consumed.advance(record.sequence) {
            return;
        }
        if let PerformanceEntry::Resource(entry) = record.entry {
            guarded("resource", || self.ingest(entry));
        }
    }

    fn ingest(&self, entry: ResourceTimingRecord) {
        if !self.should_track(&entry) {
            return;
        }

        let warnings = self.evaluate(&entry);
        if !warnings.is_empty() {
            let mut buffer = self.warnings.lock();
            for warning in warnings {
                debug!(resource = %warning.resource, kind = ?warning.kind, "resource warning");
                buffer.push_bounded(warning, self.config.max_buffer_size);
            }
        }

        self.records
            .lock()
            .push_bounded(entry, self.config.max_buffer_size);
    }

    fn evaluate(&self, entry: &ResourceTimingRecord) -> Vec<ResourceWarning> {
        let mut warnings = Vec::new();

        let threshold = self.config.size_threshold(&entry.initiator_type);
        if entry.transfer_size > threshold {
            warnings.push(ResourceWarning {
                kind: WarningKind::Size,
                resource: entry.name.clone(),
                message: format!(
                    "{} resource exceeds size threshold ({:.0}KB > {:.0}KB)",
                    entry.initiator_type,
                    entry.transfer_size as f64 / 1024.0,
                    threshold as f64 / 1024.0
                ),
                value: Some(entry.transfer_size as f64),
                threshold: Some(threshold as f64),
            });
        }

        if entry.duration > self.config.timeout_ms {
            warnings.push(ResourceWarning {
                kind: WarningKind::Performance,
                resource: entry.name.clone(),
                message: format!(
                    "resource load took {:.0}ms (timeout {:.0}ms)",
                    entry.duration, self.config.timeout_ms
                ),
                value: Some(entry.duration),
                threshold: Some(self.config.timeout_ms),
            });
        }

        if entry.looks_failed() {
            warnings.push(ResourceWarning {
                kind: WarningKind::Error,
                resource: entry.name.clone(),
                message: "resource failed to load".to_string(),
                value: None,
                threshold: None,
            });
        }

        warnings
    }
}

/// Watches the host's resource-load stream.
pub struct ResourceMonitor {
    state: Arc<ResourceState>,
    timeline: Arc<dyn PerformanceTimeline>,
    lifecycle: Lifecycle,
}

impl ResourceMonitor {
    pub fn new(config: ResourceConfig, timeline: Arc<dyn PerformanceTimeline>) -> Self {
        Self {
            state: Arc::new(ResourceState {
                config,
                records: Mutex::new(VecDeque::new()),
                warnings: Mutex::new(VecDeque::new()),
                consumed: Watermark::new(),
            }),
            timeline,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn resource_timings(&self) -> Vec<ResourceTimingRecord> {
        self.state.records.lock().iter().cloned().collect()
    }

    pub fn warnings(&self) -> Vec<ResourceWarning> {
        self.state.warnings.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> ResourceStats {
        compute_stats(&self.resource_timings(), &self.warnings())
    }

    pub fn suggestions(&self) -> Vec<String> {
        generate_suggestions(&self.stats(), &self.state.config)
    }

    pub fn clear(&self) {
        self.state.records.lock().clear();
        self.state.warnings.lock().clear();
    }
}

impl Collector for ResourceMonitor {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn start(&self) {
        let Some(token) = self.lifecycle.begin() else {
            return;
        };

        let observation = match self
            .timeline
            .observe(&[EntryKind::Resource], self.state.consumed.get())
        {
            Ok(observation) => observation,
            Err(e) => {
                warn!(collector = "resource", error = %e, "resource observation unavailable, collector idle");
                return;
            }
        };

        // Loads that finished before we subscribed.
        for record in observation.buffered {
            self.state.consume(record);
        }

        let state = self.state.clone();
        let mut receiver = observation.receiver;
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(record) if record.entry.kind() == EntryKind::Resource => {
                            state.consume(record);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(collector = "resource", skipped, "resource stream lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });
        self.lifecycle.register(task);
        info!(collector = "resource", "resource monitor started");
    }

    fn stop(&self) {
        if self.lifecycle.end() {
            info!(collector = "resource", "resource monitor stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}
