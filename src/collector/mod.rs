//! Shared collector contract.
//!
//! # LIFECYCLE INVARIANT
//! `start` and `stop` are idempotent and may be called in any order.
//! `stop` detaches every subscription, timer and task that `start` registered.
//!
//! # OWNERSHIP INVARIANT
//! A collector's buffer is mutated only by that collector. Readers always get copies.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

pub mod bounded;
pub mod guard;
pub mod lifecycle;
pub mod pattern;
pub mod watermark;

pub use bounded::BoundedPush;
pub use guard::guarded;
pub use lifecycle::Lifecycle;
pub use pattern::{matches_any, matches_pattern};
pub use watermark::Watermark;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Capture lifecycle shared by every collector the aggregator drives.
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Registers listeners, timers and observers. No-op when already running.
    fn start(&self);

    /// Detaches everything registered by `start`. No-op when not running.
    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// Policy hook consulted before a candidate is buffered.
pub trait TrackPolicy<T: ?Sized> {
    fn should_track(&self, candidate: &T) -> bool;
}

/// Probabilistic inclusion gate. `0.0` never passes, `1.0` always does.
pub fn sample(rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    rand::random::<f64>() < rate
}

/// Ticker for a periodic collector task. The immediate first tick is consumed
/// so ticks land a full period apart. Zero periods are raised to 1ms.
pub(crate) async fn cadence(period: Duration) -> Interval {
    let mut cadence = tokio::time::interval(period.max(MIN_PERIOD));
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
    cadence.tick().await;
    cadence
}

/// Wall-clock milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
