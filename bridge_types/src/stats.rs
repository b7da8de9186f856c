use std::sync::atomic::{AtomicU64, Ordering};

/// Counters referenced by the testable properties in spec.md §8 and
/// exported for diagnostics (spec.md §7: "H drops items only after
/// maxAttempts; counters are exported in statistics").
#[derive(Default)]
pub struct Stats {
    loops_detected: AtomicU64,
    messages_dropped: AtomicU64,
    messages_delivered: AtomicU64,
    duplicates_dropped: AtomicU64,
    rate_limited_dropped: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub loops_detected: u64,
    pub messages_dropped: u64,
    pub messages_delivered: u64,
    pub duplicates_dropped: u64,
    pub rate_limited_dropped: u64,
}

impl Stats {
    pub fn record_loop_detected(&self) {
        self.loops_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_dropped(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited_dropped(&self) {
        self.rate_limited_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            loops_detected: self.loops_detected.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            rate_limited_dropped: self.rate_limited_dropped.load(Ordering::Relaxed),
        }
    }
}
