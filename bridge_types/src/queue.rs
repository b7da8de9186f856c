use std::time::Instant;

use crate::config::GuildId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Guild,
    Officer,
    Event,
}

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub kind: QueueKind,
    pub target_guild_id: GuildId,
    pub rendered_text: String,
    pub source_guild_id: GuildId,
    pub attempts: u32,
    pub max_attempts: u32,
    pub first_enqueued_at: Instant,
}

impl QueueItem {
    pub fn new(
        kind: QueueKind,
        target_guild_id: impl Into<GuildId>,
        source_guild_id: impl Into<GuildId>,
        rendered_text: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        Self {
            kind,
            target_guild_id: target_guild_id.into(),
            source_guild_id: source_guild_id.into(),
            rendered_text: rendered_text.into(),
            attempts: 0,
            max_attempts,
            first_enqueued_at: Instant::now(),
        }
    }

    pub fn retried(mut self) -> Self {
        self.attempts += 1;
        self
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
