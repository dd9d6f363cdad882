pub mod monitor;
pub mod suggestions;
pub mod types;

pub use monitor::ResourceMonitor;
pub use suggestions::generate_suggestions;
pub use types::{
    group_warnings, ResourceStats, ResourceTimingRecord, ResourceWarning, TypeStats, WarningGroup,
    WarningKind,
};
