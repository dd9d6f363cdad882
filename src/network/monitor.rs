use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::transport::{HttpPipeline, HttpRequest, HttpResponse, Interceptor, Transport};
use super::types::{compute_stats, NetworkRequestRecord, NetworkStats};
use crate::collector::{matches_any, now_millis, sample, BoundedPush, Collector, TrackPolicy};
use crate::config::NetworkConfig;
use crate::error::TransportError;

/// Shared between the monitor and the interceptor it installs.
struct NetworkState {
    config: NetworkConfig,
    records: Mutex<VecDeque<NetworkRequestRecord>>,
    next_sequence: AtomicU64,
}

impl NetworkState {
    fn open(&self, request: &HttpRequest, start_time: i64) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let record = NetworkRequestRecord::new(sequence, &request.method, &request.url, start_time);
        self.records
            .lock()
            .push_bounded(record, self.config.max_buffer_size);
        sequence
    }

    /// Evicted records are silently skipped.
    fn with_record(&self, sequence: u64, f: impl FnOnce(&mut NetworkRequestRecord)) {
        let mut records = self.records.lock();
        if let Some(record) = records.iter_mut().rev().find(|r| r.sequence == sequence) {
            f(record);
        }
    }
}

impl TrackPolicy<HttpRequest> for NetworkState {
    fn should_track(&self, request: &HttpRequest) -> bool {
        !matches_any(&self.config.ignore_patterns, &request.url) && sample(self.config.sample_rate)
    }
}

/// Records each call and drives it through retry-with-backoff.
struct RetryInterceptor {
    state: Arc<NetworkState>,
}

#[async_trait]
impl Interceptor for RetryInterceptor {
    async fn intercept(
        &self,
        request: HttpRequest,
        next: &dyn Transport,
    ) -> Result<HttpResponse, TransportError> {
        let policy = &self.state.config.retry_policy;
        let started = Instant::now();
        let sequence = self
            .state
            .should_track(&request)
            .then(|| self.state.open(&request, now_millis()));

        let mut attempt = 0u32;
        let outcome = loop {
            let outcome = next.execute(request.clone()).await;
            let retryable = match &outcome {
                Ok(response) => policy.is_retryable(response.status),
                Err(_) => true,
            };
            if !retryable || attempt >= policy.max_retries {
                break outcome;
            }

            let delay = policy.delay_for(attempt);
            attempt += 1;
            if let Some(sequence) = sequence {
                self.state.with_record(sequence, |r| {
                    r.record_retry();
                });
            }
            debug!(
                url = %request.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        };

        if let Some(sequence) = sequence {
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.state.with_record(sequence, |r| {
                r.complete(duration_ms, &outcome);
            });
        }

        outcome
    }
}

/// Observes every call sent through an `HttpPipeline`.
pub struct NetworkMonitor {
    state: Arc<NetworkState>,
    pipeline: Arc<HttpPipeline>,
    installed: Mutex<Option<Arc<dyn Interceptor>>>,
}

impl NetworkMonitor {
    pub fn new(config: NetworkConfig, pipeline: Arc<HttpPipeline>) -> Self {
        Self {
            state: Arc::new(NetworkState {
                config,
                records: Mutex::new(VecDeque::new()),
                next_sequence: AtomicU64::new(0),
            }),
            pipeline,
            installed: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<HttpPipeline> {
        &self.pipeline
    }

    pub fn requests(&self) -> Vec<NetworkRequestRecord> {
        self.state.records.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> NetworkStats {
        let records = self.requests();
        compute_stats(&records, self.state.config.slow_threshold_ms as f64)
    }

    pub fn clear(&self) {
        self.state.records.lock().clear();
    }
}

impl Collector for NetworkMonitor {
    fn name(&self) -> &'static str {
        "network"
    }

    fn start(&self) {
        let mut installed = self.installed.lock();
        if installed.is_some() {
            return;
        }
        let interceptor: Arc<dyn Interceptor> = Arc::new(RetryInterceptor {
            state: self.state.clone(),
        });
        if !self.pipeline.install(interceptor.clone()) {
            warn!(collector = "network", "pipeline already intercepted; not stacking a second interceptor");
            return;
        }
        *installed = Some(interceptor);
        info!(collector = "network", "network monitor started");
    }

    fn stop(&self) {
        let Some(interceptor) = self.installed.lock().take() else {
            return;
        };
        self.pipeline.uninstall(&interceptor);
        info!(collector = "network", "network monitor stopped, transport restored");
    }

    fn is_running(&self) -> bool {
        self.installed.lock().is_some()
    }
}
