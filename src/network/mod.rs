pub mod monitor;
pub mod transport;
pub mod types;

pub use monitor::NetworkMonitor;
pub use transport::{HttpPipeline, HttpRequest, HttpResponse, Interceptor, ReqwestTransport, Transport};
pub use types::{NetworkRequestRecord, NetworkStats};
