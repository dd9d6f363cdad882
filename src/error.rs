use thiserror::Error;

/// Outcome of a single outbound call that never produced an HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Delivery failure of a telemetry payload to a reporting endpoint.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("endpoint {endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("delivery thread failed: {0}")]
    Thread(String),

    #[error("delivery failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0} export is not supported; use json or csv")]
    Unsupported(&'static str),

    #[error("nothing to export: no data types requested")]
    Empty,

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv buffer could not be finalized: {0}")]
    Buffer(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Raised when the host cannot provide an observation signal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("observation signal '{0}' is not supported by this host")]
    Unsupported(&'static str),
}
