//! Periodic rollup of every collector into a bounded snapshot history.
//!
//! # READ-ONLY INVARIANT
//! The aggregator only reads collector state. The single exception is the
//! explicit behavior flush performed during `shutdown`.

pub mod aggregator;
pub mod analysis;
pub mod snapshot;

pub use aggregator::{Aggregator, Collectors};
pub use analysis::{ErrorAnalysis, PerformanceAnalysis, UserBehaviorAnalysis};
pub use snapshot::{ResourceRollup, Snapshot};
