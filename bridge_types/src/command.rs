use std::time::Instant;

use tokio::sync::oneshot;

use crate::config::GuildId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Invite,
    Kick,
    Promote,
    Demote,
    SetRank,
    Mute,
    Unmute,
    Blacklist,
    Execute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    CommandResult,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CorrelatorResult {
    pub success: bool,
    pub result_type: ResultType,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl CorrelatorResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            result_type: ResultType::CommandResult,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result_type: ResultType::CommandResult,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn timeout() -> Self {
        Self {
            success: false,
            result_type: ResultType::Timeout,
            message: None,
            error: None,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            success: false,
            result_type: ResultType::Cancelled,
            message: None,
            error: None,
        }
    }
}

pub type ListenerId = u64;

/// Created when a slash command is dispatched; destroyed on completion,
/// cancellation, or deadline (spec.md §3).
pub struct PendingCommand {
    pub listener_id: ListenerId,
    pub guild_id: GuildId,
    pub kind: CommandKind,
    pub target: Option<String>,
    pub command: String,
    pub deadline_at: Instant,
    pub reply: Option<oneshot::Sender<CorrelatorResult>>,
}

impl PendingCommand {
    /// The matching key resolved in spec.md §9's Open Question: identity is
    /// `{guild_id, kind, target}`, with `listener_id` only for
    /// disambiguating multiple pending commands that share that key.
    pub fn matches_key(&self, guild_id: &str, kind: CommandKind, target: Option<&str>) -> bool {
        self.guild_id == guild_id && self.kind == kind && self.target.as_deref() == target
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline_at
    }
}
