pub mod monitor;
pub mod types;

pub use monitor::ErrorMonitor;
pub use types::{ErrorKind, ErrorRecord, ErrorStats, MessageCount};
