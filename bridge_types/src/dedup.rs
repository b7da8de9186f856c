use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::config::GuildId;

/// Cross-guild dedup entry within a sliding window (spec.md §3).
#[derive(Debug)]
pub struct MessageHash {
    pub hash: u64,
    pub first_seen_at: Instant,
    pub count: u32,
    pub observed_in_guilds: HashSet<GuildId>,
}

impl MessageHash {
    pub fn new(hash: u64, source_guild: impl Into<GuildId>) -> Self {
        let mut observed_in_guilds = HashSet::new();
        observed_in_guilds.insert(source_guild.into());
        Self {
            hash,
            first_seen_at: Instant::now(),
            count: 1,
            observed_in_guilds,
        }
    }

    pub fn is_stale(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.first_seen_at) > window
    }

    pub fn record(&mut self, source_guild: impl Into<GuildId>) {
        self.count += 1;
        self.observed_in_guilds.insert(source_guild.into());
    }
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    username: String,
    message: String,
    timestamp: Instant,
}

/// A bounded ring of recent `(username, message)` pairs for one
/// `(guildId, chatSubtype)` (spec.md §3). Used to catch intra-guild
/// near-duplicates such as a relayed line bouncing straight back.
pub struct PerGuildHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl PerGuildHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, username: impl Into<String>, message: impl Into<String>) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            username: username.into(),
            message: message.into(),
            timestamp: Instant::now(),
        });
    }

    pub fn contains_recent(&self, username: &str, message: &str, window: Duration) -> bool {
        let now = Instant::now();
        self.entries.iter().any(|e| {
            e.username == username
                && e.message == message
                && now.duration_since(e.timestamp) <= window
        })
    }

    pub fn shrink_to(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
    }
}

impl Default for PerGuildHistory {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Per-source-guild sliding window of send timestamps (spec.md §3).
pub struct RateLimitWindow {
    window: Duration,
    limit: usize,
    timestamps: VecDeque<Instant>,
}

impl RateLimitWindow {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            window,
            limit,
            timestamps: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns whether `now` is within the limit, and if so records it.
    pub fn check_and_record(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.timestamps.len() >= self.limit {
            false
        } else {
            self.timestamps.push_back(now);
            true
        }
    }

    pub fn is_exceeded(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.timestamps.len() >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_guild_history_detects_recent_duplicate() {
        let mut h = PerGuildHistory::new(10);
        h.push("Alice", "hello");
        assert!(h.contains_recent("Alice", "hello", Duration::from_secs(30)));
        assert!(!h.contains_recent("Alice", "goodbye", Duration::from_secs(30)));
    }

    #[test]
    fn per_guild_history_evicts_oldest_past_capacity() {
        let mut h = PerGuildHistory::new(2);
        h.push("A", "1");
        h.push("A", "2");
        h.push("A", "3");
        assert!(!h.contains_recent("A", "1", Duration::from_secs(60)));
        assert!(h.contains_recent("A", "3", Duration::from_secs(60)));
    }

    #[test]
    fn rate_limit_window_enforces_upper_bound() {
        let mut w = RateLimitWindow::new(2, Duration::from_secs(10));
        let now = Instant::now();
        assert!(w.check_and_record(now));
        assert!(w.check_and_record(now));
        assert!(!w.check_and_record(now));
    }
}
