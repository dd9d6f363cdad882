use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::ReportError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivery of telemetry payloads to reporting endpoints.
///
/// Success is any 2xx; every other status is a delivery failure. The caller
/// decides whether a failure is retried (behavior) or dropped (errors,
/// performance).
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn post(&self, endpoint: &str, body: Value) -> Result<(), ReportError>;

    /// Blocks the calling thread until delivery completes. Only used for the
    /// final flush before teardown.
    fn post_blocking(&self, endpoint: &str, body: Value) -> Result<(), ReportError>;
}

#[derive(Clone)]
pub struct HttpReporter {
    client: Client,
}

impl Default for HttpReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpReporter {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn post(&self, endpoint: &str, body: Value) -> Result<(), ReportError> {
        let response = self.client.post(endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(ReportError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }
        debug!(endpoint, "telemetry payload delivered");
        Ok(())
    }

    fn post_blocking(&self, endpoint: &str, body: Value) -> Result<(), ReportError> {
        // reqwest's blocking client must not live on a runtime thread, so the
        // request runs on its own OS thread and this one waits for it.
        let endpoint = endpoint.to_string();
        let worker = std::thread::spawn(move || -> Result<(), ReportError> {
            let client = reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?;
            let response = client.post(&endpoint).json(&body).send()?;
            if !response.status().is_success() {
                return Err(ReportError::Status {
                    endpoint,
                    status: response.status().as_u16(),
                });
            }
            Ok(())
        });

        worker
            .join()
            .map_err(|_| ReportError::Thread("blocking delivery thread panicked".to_string()))?
    }
}
