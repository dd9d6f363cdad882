#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use storefront_telemetry::error::{ReportError, TransportError};
use storefront_telemetry::network::{HttpRequest, HttpResponse, Transport};
use storefront_telemetry::services::report::Reporter;

/// Lets spawned collector tasks drain their channels.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Replays a fixed sequence of outcomes, then repeats the fallback.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    fallback: Result<HttpResponse, TransportError>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(
        script: Vec<Result<HttpResponse, TransportError>>,
        fallback: Result<HttpResponse, TransportError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn statuses(statuses: &[u16]) -> Arc<Self> {
        let last = *statuses.last().unwrap_or(&200);
        Self::new(
            statuses.iter().map(|s| Ok(HttpResponse::new(*s))).collect(),
            Ok(HttpResponse::new(last)),
        )
    }

    pub fn always_failing() -> Arc<Self> {
        Self::new(Vec::new(), Err(TransportError::Connect("connection refused".to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub endpoint: String,
    pub body: Value,
    pub blocking: bool,
}

/// Records deliveries; can be switched into failure mode.
#[derive(Default)]
pub struct MockReporter {
    deliveries: Mutex<Vec<Delivery>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl MockReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let reporter = Self::new();
        reporter.set_failing(true);
        reporter
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn deliver(&self, endpoint: &str, body: Value, blocking: bool) -> Result<(), ReportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReportError::Status {
                endpoint: endpoint.to_string(),
                status: 503,
            });
        }
        self.deliveries.lock().push(Delivery {
            endpoint: endpoint.to_string(),
            body,
            blocking,
        });
        Ok(())
    }
}

#[async_trait]
impl Reporter for MockReporter {
    async fn post(&self, endpoint: &str, body: Value) -> Result<(), ReportError> {
        self.deliver(endpoint, body, false)
    }

    fn post_blocking(&self, endpoint: &str, body: Value) -> Result<(), ReportError> {
        self.deliver(endpoint, body, true)
    }
}

use storefront_telemetry::network::HttpPipeline;
use storefront_telemetry::platform::{Document, InMemoryTimeline};
use storefront_telemetry::{Collectors, TelemetryConfig};

/// Every host seam plus the collectors built on top of them.
pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub pipeline: Arc<HttpPipeline>,
    pub timeline: Arc<InMemoryTimeline>,
    pub document: Arc<Document>,
    pub reporter: Arc<MockReporter>,
    pub collectors: Collectors,
}

pub fn harness(config: &TelemetryConfig, transport: Arc<ScriptedTransport>) -> Harness {
    let pipeline = Arc::new(HttpPipeline::new(transport.clone()));
    let timeline = Arc::new(InMemoryTimeline::new());
    let document = Arc::new(Document::new());
    let reporter = MockReporter::new();
    let collectors = Collectors::from_config(
        config,
        pipeline.clone(),
        timeline.clone(),
        document.clone(),
        reporter.clone(),
        "test-session",
    )
    .expect("test config is valid");
    Harness {
        transport,
        pipeline,
        timeline,
        document,
        reporter,
        collectors,
    }
}
