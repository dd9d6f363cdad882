//! Client telemetry pipeline for the storefront.
//!
//! Independent collectors (network, resource, performance, user behavior,
//! errors) fill their own bounded buffers as events arrive. The `Aggregator`
//! polls them on a fixed interval into immutable snapshots, keeps a bounded
//! history and answers analytical queries; `export` turns a selection of that
//! data into JSON or CSV.

pub mod aggregator;
pub mod behavior;
pub mod collector;
pub mod config;
pub mod error;
pub mod errors;
pub mod export;
pub mod network;
pub mod performance;
pub mod platform;
pub mod resource;
pub mod services;

pub use aggregator::{Aggregator, Collectors, Snapshot};
pub use collector::Collector;
pub use config::TelemetryConfig;
