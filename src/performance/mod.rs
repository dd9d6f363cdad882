pub mod analytics;
pub mod collector;
pub mod types;

pub use analytics::{analyze, Anomaly, PerformanceAnalytics, Trend};
pub use collector::PerformanceCollector;
pub use types::PerformanceMetrics;
