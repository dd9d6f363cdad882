//! Delegated interaction capture.
//!
//! # PRIVACY INVARIANT
//! Values of sensitive fields are replaced with the redaction marker before a
//! record enters the buffer. Nothing downstream ever sees the original value.
//!
//! # DELIVERY
//! Batches are delivered at-least-once: a failed flush puts its records back
//! into the live buffer for the next cycle. Order across retries is not kept.
//! The teardown flush is the only blocking call in the pipeline.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::redact::{is_sensitive, redact_fields, REDACTION_MARKER};
use super::types::{top_n, BehaviorStats, UserActionRecord};
use crate::collector::{
    cadence, guarded, matches_any, now_millis, sample, BoundedPush, Collector, Lifecycle,
    TrackPolicy,
};
use crate::config::BehaviorConfig;
use crate::error::ReportError;
use crate::platform::{Document, DocumentSignal, DomEvent, ElementInfo, EventKind};
use crate::services::report::Reporter;

const TOP_TARGETS: usize = 10;
const MAX_DISTINCT_TARGETS: usize = 1000;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BehaviorBatch<'a> {
    session_id: &'a str,
    sent_at: i64,
    events: &'a [UserActionRecord],
}

#[derive(Default)]
struct Counters {
    total: u64,
    by_type: BTreeMap<String, u64>,
    by_target: HashMap<String, u64>,
    flushed: u64,
    failed_flushes: u64,
    dropped: u64,
}

struct BehaviorState {
    config: BehaviorConfig,
    session_id: String,
    endpoint: String,
    reporter: Arc<dyn Reporter>,
    buffer: Mutex<VecDeque<UserActionRecord>>,
    /// Latest input per field still inside its debounce window, tagged with
    /// the generation of the timer that will record it.
    pending_inputs: Mutex<HashMap<String, (u64, UserActionRecord)>>,
    next_generation: AtomicU64,
    counters: Mutex<Counters>,
    lifecycle: Lifecycle,
}

impl TrackPolicy<DomEvent> for BehaviorState {
    fn should_track(&self, event: &DomEvent) -> bool {
        self.is_eligible(&event.target)
            && !matches_any(&self.config.ignore_patterns, &event.url)
            && sample(self.config.sample_rate)
    }
}

impl BehaviorState {
    fn is_eligible(&self, target: &ElementInfo) -> bool {
        if target.has_attribute(&self.config.opt_out_attribute) {
            return false;
        }
        !self.config.excluded_tags.iter().any(|t| t.eq_ignore_ascii_case(&target.tag))
    }

    fn build_record(&self, event: &DomEvent) -> UserActionRecord {
        let sensitive = &self.config.sensitive_fields;
        let mut data = BTreeMap::new();

        match event.kind {
            EventKind::Click => {
                if let Some(href) = event.target.attributes.get("href") {
                    data.insert("href".to_string(), href.clone());
                }
            }
            EventKind::Input => {
                let field = event
                    .target
                    .name
                    .clone()
                    .or_else(|| event.target.id.clone())
                    .unwrap_or_default();
                let value = event.value.clone().unwrap_or_default();
                let identifiers = [event.target.name.as_deref(), event.target.id.as_deref()];
                let redact = identifiers
                    .into_iter()
                    .flatten()
                    .any(|ident| is_sensitive(ident, sensitive));
                let value = if redact {
                    REDACTION_MARKER.to_string()
                } else {
                    value
                };
                data.insert("field".to_string(), field);
                data.insert("value".to_string(), value);
            }
            EventKind::Submit => {
                data = redact_fields(&event.fields, sensitive);
            }
            EventKind::Navigation => {
                data.insert("to".to_string(), event.url.clone());
            }
        }

        UserActionRecord {
            kind: event.kind,
            target: event.target.path(),
            timestamp: now_millis(),
            url: event.url.clone(),
            data,
        }
    }

    fn handle(self: &Arc<Self>, event: DomEvent) {
        if !self.should_track(&event) {
            return;
        }
        let record = self.build_record(&event);
        match event.kind {
            EventKind::Input => self.debounce(record),
            _ => self.push(record),
        }
    }

    /// Trailing debounce per field: only the last input within the dedupe
    /// interval is recorded.
    fn debounce(self: &Arc<Self>, record: UserActionRecord) {
        let interval = Duration::from_millis(self.config.dedupe_interval_ms);
        if interval.is_zero() {
            self.push(record);
            return;
        }

        let key = record.target.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.pending_inputs
            .lock()
            .insert(key.clone(), (generation, record));

        let state = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let settled = {
                let mut pending = state.pending_inputs.lock();
                match pending.get(&key) {
                    Some((latest, _)) if *latest == generation => pending.remove(&key),
                    _ => None,
                }
            };
            if let Some((_, record)) = settled {
                state.push(record);
            }
        });
        self.lifecycle.register(task);
    }

    /// Moves inputs still waiting out their debounce window into the buffer.
    /// Used at teardown, where no timer will fire for them.
    fn promote_pending(&self) -> usize {
        let mut pending: Vec<(u64, UserActionRecord)> =
            self.pending_inputs.lock().drain().map(|(_, v)| v).collect();
        pending.sort_by_key(|(generation, _)| *generation);
        let promoted = pending.len();
        for (_, record) in pending {
            self.record(record);
        }
        if promoted > 0 {
            debug!(collector = "behavior", promoted, "pending inputs promoted for teardown");
        }
        promoted
    }

    fn push(self: &Arc<Self>, record: UserActionRecord) {
        let len = self.record(record);

        // Not tied to the lifecycle; an in-flight flush outlives stop().
        if len >= self.config.batch_size {
            let state = self.clone();
            tokio::spawn(async move {
                let _ = state.flush().await;
            });
        }
    }

    /// Counts and buffers a record. Returns the buffer length afterwards.
    fn record(&self, record: UserActionRecord) -> usize {
        {
            let mut counters = self.counters.lock();
            counters.total += 1;
            *counters.by_type.entry(record.kind.as_str().to_string()).or_insert(0) += 1;
            let tracked_targets = counters.by_target.len();
            match counters.by_target.get_mut(&record.target) {
                Some(count) => *count += 1,
                None if tracked_targets < MAX_DISTINCT_TARGETS => {
                    counters.by_target.insert(record.target.clone(), 1);
                }
                None => {}
            }
        }

        let mut buffer = self.buffer.lock();
        if buffer.push_bounded(record, self.config.max_buffer_size).is_some() {
            self.counters.lock().dropped += 1;
            warn!(collector = "behavior", "behavior buffer full, dropped oldest record");
        }
        buffer.len()
    }

    fn take_batch(&self) -> Vec<UserActionRecord> {
        self.buffer.lock().drain(..).collect()
    }

    fn encode(&self, batch: &[UserActionRecord]) -> Result<serde_json::Value, ReportError> {
        let body = serde_json::to_value(BehaviorBatch {
            session_id: &self.session_id,
            sent_at: now_millis(),
            events: batch,
        })?;
        Ok(body)
    }

    async fn flush(&self) -> Result<usize, ReportError> {
        let batch = self.take_batch();
        if batch.is_empty() {
            return Ok(0);
        }
        let result = match self.encode(&batch) {
            Ok(body) => self.reporter.post(&self.endpoint, body).await,
            Err(e) => Err(e),
        };
        self.settle(batch, result)
    }

    fn flush_blocking(&self) -> Result<usize, ReportError> {
        self.promote_pending();
        let batch = self.take_batch();
        if batch.is_empty() {
            return Ok(0);
        }
        let result = self
            .encode(&batch)
            .and_then(|body| self.reporter.post_blocking(&self.endpoint, body));
        self.settle(batch, result)
    }

    fn settle(
        &self,
        batch: Vec<UserActionRecord>,
        result: Result<(), ReportError>,
    ) -> Result<usize, ReportError> {
        let sent = batch.len();
        match result {
            Ok(()) => {
                self.counters.lock().flushed += sent as u64;
                debug!(collector = "behavior", sent, "behavior batch delivered");
                Ok(sent)
            }
            Err(e) => {
                warn!(collector = "behavior", error = %e, count = sent, "behavior flush failed, re-buffering");
                self.counters.lock().failed_flushes += 1;
                self.requeue(batch);
                Err(e)
            }
        }
    }

    /// Puts unsent records back at the front. When that would overflow the
    /// buffer the oldest unsent records are dropped.
    fn requeue(&self, batch: Vec<UserActionRecord>) {
        let mut dropped = 0u64;
        {
            let mut buffer = self.buffer.lock();
            for record in batch.into_iter().rev() {
                if buffer.len() >= self.config.max_buffer_size {
                    dropped += 1;
                    continue;
                }
                buffer.push_front(record);
            }
        }
        if dropped > 0 {
            self.counters.lock().dropped += dropped;
            warn!(collector = "behavior", dropped, "behavior buffer full while re-buffering");
        }
    }
}

/// Captures clicks, submits, inputs and navigations from the document hub.
pub struct UserBehaviorTracker {
    state: Arc<BehaviorState>,
    document: Arc<Document>,
}

impl UserBehaviorTracker {
    pub fn new(
        config: BehaviorConfig,
        document: Arc<Document>,
        reporter: Arc<dyn Reporter>,
        endpoint: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            state: Arc::new(BehaviorState {
                config,
                session_id: session_id.into(),
                endpoint: endpoint.into(),
                reporter,
                buffer: Mutex::new(VecDeque::new()),
                pending_inputs: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                counters: Mutex::new(Counters::default()),
                lifecycle: Lifecycle::new(),
            }),
            document,
        }
    }

    /// Copy of the records awaiting delivery.
    pub fn events(&self) -> Vec<UserActionRecord> {
        self.state.buffer.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> BehaviorStats {
        let buffered = self.state.buffer.lock().len() as u64;
        let counters = self.state.counters.lock();
        BehaviorStats {
            total_events: counters.total,
            events_by_type: counters.by_type.clone(),
            top_targets: top_n(
                counters.by_target.iter().map(|(k, v)| (k.clone(), *v)),
                TOP_TARGETS,
            ),
            buffered,
            flushed: counters.flushed,
            failed_flushes: counters.failed_flushes,
            dropped: counters.dropped,
        }
    }

    pub async fn flush(&self) -> Result<usize, ReportError> {
        self.state.flush().await
    }

    /// Synchronous delivery of everything buffered, for page teardown.
    pub fn flush_blocking(&self) -> Result<usize, ReportError> {
        self.state.flush_blocking()
    }

    pub fn clear(&self) {
        self.state.buffer.lock().clear();
        self.state.pending_inputs.lock().clear();
        *self.state.counters.lock() = Counters::default();
    }
}

impl Collector for UserBehaviorTracker {
    fn name(&self) -> &'static str {
        "behavior"
    }

    fn start(&self) {
        let Some(token) = self.state.lifecycle.begin() else {
            return;
        };

        let state = self.state.clone();
        let mut receiver = self.document.subscribe();
        let listener_token = token.clone();
        let listener = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = listener_token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(DocumentSignal::Interaction(event)) => {
                            guarded("behavior", || state.handle(event));
                        }
                        Ok(DocumentSignal::Unload) => {
                            if let Some(Err(e)) = guarded("behavior", || state.flush_blocking()) {
                                warn!(collector = "behavior", error = %e, "teardown flush failed");
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(collector = "behavior", skipped, "document stream lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });
        self.state.lifecycle.register(listener);

        let state = self.state.clone();
        let period = Duration::from_millis(self.state.config.flush_interval_ms);
        let timer = tokio::spawn(async move {
            let mut ticker = cadence(period).await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = state.flush().await;
                    }
                }
            }
        });
        self.state.lifecycle.register(timer);
        info!(collector = "behavior", session = %self.state.session_id, "behavior tracker started");
    }

    fn stop(&self) {
        if self.state.lifecycle.end() {
            // Debounce timers were just aborted; keep what they would have recorded.
            self.state.promote_pending();
            info!(collector = "behavior", "behavior tracker stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.state.lifecycle.is_running()
    }
}
