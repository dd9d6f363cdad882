//! Host seams standing in for the browser's global observation APIs.
//!
//! Hosts feed these hubs; collectors subscribe on `start` and drop their
//! subscriptions on `stop`. Nothing here is a global.

pub mod document;
pub mod timeline;

pub use document::{Document, DocumentSignal, DomEvent, ElementInfo, EventKind};
pub use timeline::{
    EntryKind, InMemoryTimeline, MemorySample, Observation, PerformanceEntry, PerformanceTimeline,
    TimelineRecord, TimingKind,
};
