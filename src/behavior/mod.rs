pub mod redact;
pub mod tracker;
pub mod types;

pub use redact::{is_sensitive, REDACTION_MARKER};
pub use tracker::UserBehaviorTracker;
pub use types::{BehaviorStats, TargetCount, UserActionRecord};
