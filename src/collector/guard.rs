use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

/// Runs a collector callback, logging and swallowing any panic so it never
/// unwinds into host code.
pub fn guarded<R>(collector: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(collector, %reason, "collector callback panicked");
            None
        }
    }
}
