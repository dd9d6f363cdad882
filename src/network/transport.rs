//! Pluggable outbound transport with one restorable interception slot.
//!
//! The application sends every outbound call through an `HttpPipeline`.
//! Monitoring installs an `Interceptor` on the pipeline rather than patching
//! the transport itself, so the base transport is always reachable and
//! restoring it is just clearing the slot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let mut request = Self::new("POST", url);
        request.body = Some(body.into());
        request
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Wraps a call to `next`. Must resolve exactly once per request.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        request: HttpRequest,
        next: &dyn Transport,
    ) -> Result<HttpResponse, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}

pub struct HttpPipeline {
    base: Arc<dyn Transport>,
    interceptor: RwLock<Option<Arc<dyn Interceptor>>>,
}

impl HttpPipeline {
    pub fn new(base: Arc<dyn Transport>) -> Self {
        Self {
            base,
            interceptor: RwLock::new(None),
        }
    }

    /// Installs `interceptor` unless one is already present.
    /// Returns `false` instead of stacking a second interceptor.
    pub fn install(&self, interceptor: Arc<dyn Interceptor>) -> bool {
        let mut slot = self.interceptor.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(interceptor);
        true
    }

    /// Clears the slot if it still holds `interceptor`.
    pub fn uninstall(&self, interceptor: &Arc<dyn Interceptor>) -> bool {
        let mut slot = self.interceptor.write();
        let same = slot
            .as_ref()
            .is_some_and(|current| same_allocation(current, interceptor));
        if same {
            *slot = None;
        }
        same
    }

    pub fn is_intercepted(&self) -> bool {
        self.interceptor.read().is_some()
    }

    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let interceptor = self.interceptor.read().clone();
        match interceptor {
            Some(interceptor) => interceptor.intercept(request, self.base.as_ref()).await,
            None => self.base.execute(request).await,
        }
    }
}

fn same_allocation(a: &Arc<dyn Interceptor>, b: &Arc<dyn Interceptor>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
