use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::analytics::{analyze, PerformanceAnalytics};
use super::types::{FrameWindow, PerformanceMetrics};
use crate::collector::{cadence, guarded, BoundedPush, Collector, Lifecycle, Watermark};
use crate::config::PerformanceConfig;
use crate::platform::{EntryKind, PerformanceEntry, PerformanceTimeline, TimelineRecord, TimingKind};
use crate::services::report::Reporter;

const OBSERVED_KINDS: [EntryKind; 7] = [
    EntryKind::Paint,
    EntryKind::LargestContentfulPaint,
    EntryKind::FirstInput,
    EntryKind::LayoutShift,
    EntryKind::Navigation,
    EntryKind::Measure,
    EntryKind::Frame,
];

#[derive(Default)]
struct Live {
    metrics: PerformanceMetrics,
    frames: FrameWindow,
}

struct PerformanceState {
    config: PerformanceConfig,
    live: Mutex<Live>,
    history: Mutex<VecDeque<PerformanceMetrics>>,
    consumed: Watermark,
}

impl PerformanceState {
    /// Running totals must not see an entry twice, so replays after a
    /// restart are skipped.
    fn consume(&self, record: TimelineRecord) {
        if self.consumed.advance(record.sequence) {
            guarded("performance", || self.apply(record.entry));
        }
    }

    fn apply(&self, entry: PerformanceEntry) {
        let mut guard = self.live.lock();
        let Live { metrics, frames } = &mut *guard;
        match entry {
            PerformanceEntry::Paint { name, start_time } => match name.as_str() {
                "first-paint" => metrics.first_paint = Some(start_time),
                "first-contentful-paint" => metrics.first_contentful_paint = Some(start_time),
                other => debug!(name = other, "ignoring unknown paint entry"),
            },
            PerformanceEntry::LargestContentfulPaint { start_time } => {
                metrics.largest_contentful_paint = Some(start_time);
            }
            PerformanceEntry::FirstInput { start_time, processing_start } => {
                metrics.first_input_delay = Some((processing_start - start_time).max(0.0));
            }
            PerformanceEntry::LayoutShift { value, had_recent_input } => {
                // Shifts right after user input are expected and not counted.
                if !had_recent_input {
                    let total = metrics.cumulative_layout_shift.unwrap_or(0.0) + value;
                    metrics.cumulative_layout_shift = Some(total);
                }
            }
            PerformanceEntry::Navigation { request_start, response_start } => {
                metrics.time_to_first_byte = Some((response_start - request_start).max(0.0));
            }
            PerformanceEntry::Measure { kind, duration } => match kind {
                TimingKind::Script => metrics.script_time_ms += duration,
                TimingKind::Layout => metrics.layout_time_ms += duration,
                TimingKind::Paint => metrics.paint_time_ms += duration,
            },
            PerformanceEntry::Frame { timestamp_ms } => {
                if let Some(fps) = frames.frame(timestamp_ms) {
                    metrics.fps = Some(fps);
                }
            }
            PerformanceEntry::Resource(_) => {}
        }
    }

    fn sample_memory(&self, timeline: &dyn PerformanceTimeline) {
        if let Some(sample) = timeline.memory() {
            self.live.lock().metrics.memory_usage_percent = Some(sample.usage_percent());
        }
    }

    /// Appends the current metrics to the collector's own bounded history.
    fn checkpoint(&self) -> PerformanceMetrics {
        let snapshot = self.live.lock().metrics.clone();
        self.history
            .lock()
            .push_bounded(snapshot.clone(), self.config.max_buffer_size);
        snapshot
    }
}

/// Page-load metrics merged with continuously sampled runtime metrics.
pub struct PerformanceCollector {
    state: Arc<PerformanceState>,
    timeline: Arc<dyn PerformanceTimeline>,
    reporter: Arc<dyn Reporter>,
    endpoint: String,
    lifecycle: Lifecycle,
}

impl PerformanceCollector {
    pub fn new(
        config: PerformanceConfig,
        timeline: Arc<dyn PerformanceTimeline>,
        reporter: Arc<dyn Reporter>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            state: Arc::new(PerformanceState {
                config,
                live: Mutex::new(Live::default()),
                history: Mutex::new(VecDeque::new()),
                consumed: Watermark::new(),
            }),
            timeline,
            reporter,
            endpoint: endpoint.into(),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.state.live.lock().metrics.clone()
    }

    pub fn history(&self) -> Vec<PerformanceMetrics> {
        self.state.history.lock().iter().cloned().collect()
    }

    /// Analytics over the collector's own sampled history.
    pub fn analytics(&self) -> Option<PerformanceAnalytics> {
        analyze(&self.history(), &self.state.config.thresholds)
    }

    pub fn clear(&self) {
        *self.state.live.lock() = Live::default();
        self.state.history.lock().clear();
    }

    fn spawn_observer(&self, kinds: &[EntryKind]) {
        let Some(token) = self.lifecycle.token() else {
            return;
        };
        let observation = match self.timeline.observe(kinds, self.state.consumed.get()) {
            Ok(observation) => observation,
            Err(e) => {
                warn!(collector = "performance", error = %e, "performance observation unavailable");
                return;
            }
        };

        for record in observation.buffered {
            self.state.consume(record);
        }

        let state = self.state.clone();
        let kinds = kinds.to_vec();
        let mut receiver = observation.receiver;
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(record) if kinds.contains(&record.entry.kind()) => {
                            state.consume(record);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(collector = "performance", skipped, "performance stream lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });
        self.lifecycle.register(task);
    }

    fn spawn_sampler(&self) {
        let Some(token) = self.lifecycle.token() else {
            return;
        };
        let memory_supported = self.timeline.supports(EntryKind::Memory);
        if !memory_supported {
            warn!(collector = "performance", "memory sampling unsupported, skipping memory metrics");
        }

        let state = self.state.clone();
        let timeline = self.timeline.clone();
        let reporter = self.reporter.clone();
        let endpoint = self.endpoint.clone();
        let period = Duration::from_millis(self.state.config.sample_interval_ms);

        let task = tokio::spawn(async move {
            let mut ticker = cadence(period).await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if memory_supported {
                            guarded("performance", || state.sample_memory(timeline.as_ref()));
                        }
                        let Some(snapshot) = guarded("performance", || state.checkpoint()) else {
                            continue;
                        };
                        if state.config.report {
                            report(reporter.clone(), endpoint.clone(), snapshot);
                        }
                    }
                }
            }
        });
        self.lifecycle.register(task);
    }
}

/// Best-effort: failures are logged and dropped.
fn report(reporter: Arc<dyn Reporter>, endpoint: String, metrics: PerformanceMetrics) {
    tokio::spawn(async move {
        let body = match serde_json::to_value(&metrics) {
            Ok(body) => body,
            Err(e) => {
                warn!(collector = "performance", error = %e, "failed to encode performance report");
                return;
            }
        };
        if let Err(e) = reporter.post(&endpoint, body).await {
            warn!(collector = "performance", error = %e, "performance report dropped");
        }
    });
}

impl Collector for PerformanceCollector {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn start(&self) {
        if self.lifecycle.begin().is_none() {
            return;
        }

        let (supported, unsupported): (Vec<EntryKind>, Vec<EntryKind>) = OBSERVED_KINDS
            .into_iter()
            .partition(|kind| self.timeline.supports(*kind));
        for kind in &unsupported {
            warn!(collector = "performance", signal = kind.as_str(), "signal unsupported, degrading to no-op");
        }

        if !supported.is_empty() {
            self.spawn_observer(&supported);
        }
        self.spawn_sampler();
        info!(collector = "performance", "performance collector started");
    }

    fn stop(&self) {
        if self.lifecycle.end() {
            info!(collector = "performance", "performance collector stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}
