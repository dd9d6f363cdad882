//! Process-lifetime error capture.
//!
//! Registers once for panics and exposes explicit hooks for failed background
//! tasks and UI-boundary errors. There is no `stop`: once registered, the
//! panic hook stays for the life of the process.
//!
//! Reports are fire-and-forget. A failed delivery is logged and dropped.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{ErrorKind, ErrorRecord, ErrorStats, MessageCount};
use crate::collector::{matches_any, now_millis, sample, BoundedPush, TrackPolicy};
use crate::config::ErrorConfig;
use crate::services::report::Reporter;

const TOP_MESSAGES: usize = 5;
const MAX_DISTINCT_MESSAGES: usize = 500;

type ErrorFilter = Box<dyn Fn(&ErrorRecord) -> bool + Send + Sync>;

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorReport<'a> {
    session_id: &'a str,
    error: &'a ErrorRecord,
}

#[derive(Default)]
struct Counters {
    total: u64,
    by_type: BTreeMap<String, u64>,
    by_message: HashMap<String, u64>,
}

pub struct ErrorMonitor {
    config: ErrorConfig,
    reporter: Arc<dyn Reporter>,
    endpoint: String,
    session_id: String,
    agent: String,
    page_url: Mutex<String>,
    filter: Option<ErrorFilter>,
    errors: Mutex<VecDeque<ErrorRecord>>,
    counters: Mutex<Counters>,
    registered: AtomicBool,
    runtime: Option<Handle>,
}

impl TrackPolicy<ErrorRecord> for ErrorMonitor {
    fn should_track(&self, record: &ErrorRecord) -> bool {
        if matches_any(&self.config.ignore_patterns, &record.message) {
            return false;
        }
        if let Some(filter) = &self.filter {
            if !filter(record) {
                return false;
            }
        }
        sample(self.config.sample_rate)
    }
}

impl ErrorMonitor {
    pub fn new(
        config: ErrorConfig,
        reporter: Arc<dyn Reporter>,
        endpoint: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            config,
            reporter,
            endpoint: endpoint.into(),
            session_id: session_id.into(),
            agent: format!(
                "{}/{} ({})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS
            ),
            page_url: Mutex::new(String::new()),
            filter: None,
            errors: Mutex::new(VecDeque::new()),
            counters: Mutex::new(Counters::default()),
            registered: AtomicBool::new(false),
            // Panics can fire on threads outside the runtime; keep a handle for reporting.
            runtime: Handle::try_current().ok(),
        }
    }

    /// Pre-filter consulted before an error is buffered. `false` drops it.
    pub fn with_filter(mut self, filter: impl Fn(&ErrorRecord) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn set_page_url(&self, url: impl Into<String>) {
        *self.page_url.lock() = url.into();
    }

    /// Installs the panic hook. Safe to call repeatedly; only the first call
    /// registers. The previous hook still runs after capture.
    pub fn register(self: &Arc<Self>) {
        if self.registered.swap(true, Ordering::SeqCst) {
            return;
        }

        let monitor = Arc::downgrade(self);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let reentrant = IN_HOOK.with(|flag| flag.replace(true));
            if !reentrant {
                if let Some(monitor) = monitor.upgrade() {
                    let message = info
                        .payload()
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| info.payload().downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "panic with non-string payload".to_string());
                    let stack = info
                        .location()
                        .map(|l| format!("at {}:{}:{}", l.file(), l.line(), l.column()));
                    monitor.capture(ErrorKind::Error, message, stack, None);
                }
                IN_HOOK.with(|flag| flag.set(false));
            }
            previous(info);
        }));
        info!(collector = "errors", "error monitor registered");
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn capture_error(&self, message: impl Into<String>, stack: Option<String>) {
        self.capture(ErrorKind::Error, message.into(), stack, None);
    }

    pub fn capture_rejection(&self, reason: impl Display) {
        self.capture(ErrorKind::UnhandledRejection, reason.to_string(), None, None);
    }

    /// Hook for errors caught at a UI component boundary.
    pub fn capture_boundary_error(
        &self,
        message: impl Into<String>,
        stack: Option<String>,
        component_stack: impl Into<String>,
    ) {
        self.capture(ErrorKind::Boundary, message.into(), stack, Some(component_stack.into()));
    }

    /// Spawns `task`; if it resolves to `Err` the error is captured as an
    /// unhandled rejection.
    pub fn spawn_monitored<F, T, E>(self: &Arc<Self>, task: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                monitor.capture_rejection(e);
            }
        })
    }

    /// Copy of the ring buffer, oldest first.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> ErrorStats {
        let buffered = self.errors.lock().len() as u64;
        let counters = self.counters.lock();
        let mut top: Vec<MessageCount> = counters
            .by_message
            .iter()
            .map(|(message, count)| MessageCount {
                message: message.clone(),
                count: *count,
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        top.truncate(TOP_MESSAGES);

        ErrorStats {
            total_errors: counters.total,
            by_type: counters.by_type.clone(),
            buffered,
            top_messages: top,
        }
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
        *self.counters.lock() = Counters::default();
    }

    fn capture(
        &self,
        kind: ErrorKind,
        message: String,
        stack: Option<String>,
        component_stack: Option<String>,
    ) {
        let record = ErrorRecord {
            message,
            stack,
            component_stack,
            kind,
            timestamp: now_millis(),
            url: self.page_url.lock().clone(),
            agent: self.agent.clone(),
        };
        if !self.should_track(&record) {
            return;
        }

        {
            let mut counters = self.counters.lock();
            counters.total += 1;
            *counters.by_type.entry(kind.as_str().to_string()).or_insert(0) += 1;
            let distinct = counters.by_message.len();
            match counters.by_message.get_mut(&record.message) {
                Some(count) => *count += 1,
                None if distinct < MAX_DISTINCT_MESSAGES => {
                    counters.by_message.insert(record.message.clone(), 1);
                }
                None => {}
            }
        }
        self.errors
            .lock()
            .push_bounded(record.clone(), self.config.max_buffer_size);
        debug!(collector = "errors", kind = kind.as_str(), "error captured");

        if self.config.report {
            self.report(record);
        }
    }

    fn report(&self, record: ErrorRecord) {
        let body = match serde_json::to_value(ErrorReport {
            session_id: &self.session_id,
            error: &record,
        }) {
            Ok(body) => body,
            Err(e) => {
                warn!(collector = "errors", error = %e, "failed to encode error report");
                return;
            }
        };

        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            debug!(collector = "errors", "no runtime available, error report skipped");
            return;
        };
        let reporter = self.reporter.clone();
        let endpoint = self.endpoint.clone();
        runtime.spawn(async move {
            if let Err(e) = reporter.post(&endpoint, body).await {
                warn!(collector = "errors", error = %e, "error report dropped");
            }
        });
    }
}
