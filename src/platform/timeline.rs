use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::collector::BoundedPush;
use crate::error::PlatformError;
use crate::resource::types::ResourceTimingRecord;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_BUFFERED_ENTRIES: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimingKind {
    Script,
    Layout,
    Paint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entryType", rename_all = "kebab-case")]
pub enum PerformanceEntry {
    Resource(ResourceTimingRecord),
    Paint { name: String, start_time: f64 },
    LargestContentfulPaint { start_time: f64 },
    FirstInput { start_time: f64, processing_start: f64 },
    LayoutShift { value: f64, had_recent_input: bool },
    Navigation { request_start: f64, response_start: f64 },
    Measure { kind: TimingKind, duration: f64 },
    Frame { timestamp_ms: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Resource,
    Paint,
    LargestContentfulPaint,
    FirstInput,
    LayoutShift,
    Navigation,
    Measure,
    Frame,
    Memory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Resource => "resource",
            EntryKind::Paint => "paint",
            EntryKind::LargestContentfulPaint => "largest-contentful-paint",
            EntryKind::FirstInput => "first-input",
            EntryKind::LayoutShift => "layout-shift",
            EntryKind::Navigation => "navigation",
            EntryKind::Measure => "measure",
            EntryKind::Frame => "frame",
            EntryKind::Memory => "memory",
        }
    }
}

impl PerformanceEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            PerformanceEntry::Resource(_) => EntryKind::Resource,
            PerformanceEntry::Paint { .. } => EntryKind::Paint,
            PerformanceEntry::LargestContentfulPaint { .. } => EntryKind::LargestContentfulPaint,
            PerformanceEntry::FirstInput { .. } => EntryKind::FirstInput,
            PerformanceEntry::LayoutShift { .. } => EntryKind::LayoutShift,
            PerformanceEntry::Navigation { .. } => EntryKind::Navigation,
            PerformanceEntry::Measure { .. } => EntryKind::Measure,
            PerformanceEntry::Frame { .. } => EntryKind::Frame,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySample {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl MemorySample {
    pub fn usage_percent(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.limit_bytes as f64 * 100.0
    }
}

/// An entry stamped with its position in the timeline. Sequences only grow.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRecord {
    pub sequence: u64,
    pub entry: PerformanceEntry,
}

/// Entries that completed before the subscription plus the live stream.
pub struct Observation {
    pub buffered: Vec<TimelineRecord>,
    pub receiver: broadcast::Receiver<TimelineRecord>,
}

/// The host's performance observation API.
pub trait PerformanceTimeline: Send + Sync {
    fn supports(&self, kind: EntryKind) -> bool;

    /// Subscribes to the live stream. The buffered snapshot of `kinds` and the
    /// subscription are taken atomically so no entry is missed or seen twice.
    /// Buffered entries at or before `after` are left out, so a restarted
    /// observer does not consume the same entry again.
    /// Fails if any requested kind is unsupported.
    fn observe(&self, kinds: &[EntryKind], after: Option<u64>) -> Result<Observation, PlatformError>;

    fn memory(&self) -> Option<MemorySample>;
}

#[derive(Default)]
struct Buffered {
    records: VecDeque<TimelineRecord>,
    next_sequence: u64,
}

/// In-process timeline fed by the host application.
pub struct InMemoryTimeline {
    sender: broadcast::Sender<TimelineRecord>,
    buffered: Mutex<Buffered>,
    max_buffered: usize,
    unsupported: HashSet<EntryKind>,
    memory: Mutex<Option<MemorySample>>,
}

impl Default for InMemoryTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTimeline {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            sender,
            buffered: Mutex::new(Buffered::default()),
            max_buffered: DEFAULT_BUFFERED_ENTRIES,
            unsupported: HashSet::new(),
            memory: Mutex::new(None),
        }
    }

    /// Marks signals this host cannot provide.
    pub fn with_unsupported(mut self, kinds: impl IntoIterator<Item = EntryKind>) -> Self {
        self.unsupported.extend(kinds);
        self
    }

    pub fn publish(&self, entry: PerformanceEntry) {
        if self.unsupported.contains(&entry.kind()) {
            return;
        }
        // Hold the buffer lock across send so `observe` sees a consistent cut.
        let mut buffered = self.buffered.lock();
        let record = TimelineRecord {
            sequence: buffered.next_sequence,
            entry,
        };
        buffered.next_sequence += 1;
        buffered.records.push_bounded(record.clone(), self.max_buffered);
        let _ = self.sender.send(record);
    }

    pub fn set_memory(&self, sample: Option<MemorySample>) {
        *self.memory.lock() = sample;
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl PerformanceTimeline for InMemoryTimeline {
    fn supports(&self, kind: EntryKind) -> bool {
        !self.unsupported.contains(&kind)
    }

    fn observe(&self, kinds: &[EntryKind], after: Option<u64>) -> Result<Observation, PlatformError> {
        if let Some(kind) = kinds.iter().find(|k| !self.supports(**k)) {
            return Err(PlatformError::Unsupported(kind.as_str()));
        }
        let buffered = self.buffered.lock();
        let receiver = self.sender.subscribe();
        Ok(Observation {
            buffered: buffered
                .records
                .iter()
                .filter(|r| after.map_or(true, |seen| r.sequence > seen))
                .filter(|r| kinds.contains(&r.entry.kind()))
                .cloned()
                .collect(),
            receiver,
        })
    }

    fn memory(&self) -> Option<MemorySample> {
        if self.unsupported.contains(&EntryKind::Memory) {
            return None;
        }
        *self.memory.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(start_time: f64) -> PerformanceEntry {
        PerformanceEntry::Paint {
            name: "first-paint".to_string(),
            start_time,
        }
    }

    #[test]
    fn test_observe_skips_entries_already_seen() {
        let timeline = InMemoryTimeline::new();
        timeline.publish(paint(1.0));
        timeline.publish(PerformanceEntry::LargestContentfulPaint { start_time: 2.0 });
        timeline.publish(paint(3.0));

        let all = timeline.observe(&[EntryKind::Paint], None).unwrap();
        let sequences: Vec<_> = all.buffered.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![0, 2]);

        let rest = timeline.observe(&[EntryKind::Paint], Some(0)).unwrap();
        assert_eq!(rest.buffered.len(), 1);
        assert_eq!(rest.buffered[0].entry, paint(3.0));
    }
}
