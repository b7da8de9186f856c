use bridge_types::{ClassifiedRecord, EventKind, GuildConfig, ResultType};

use crate::client::{Card, CardKind};
use crate::commands::{DispatchOutcome, SlashCommand};
use bridge_core::ConnectionLifecycle;

/// Renders the outcome of a dispatched slash command (spec.md §4.I / §7:
/// "I surfaces all errors as distinct card types").
pub fn render_dispatch(cmd: &SlashCommand, outcome: &DispatchOutcome) -> Card {
    match outcome {
        DispatchOutcome::Rejected(reason) => {
            Card::new(CardKind::Rejected, "Command Rejected", reason.clone())
        }
        DispatchOutcome::Resolved(result) => match result.result_type {
            ResultType::Timeout => Card::new(
                CardKind::Timeout,
                "Command Timeout",
                format!("No confirmation received for `{}` within the timeout.", cmd.describe()),
            ),
            ResultType::Cancelled => Card::new(
                CardKind::Failure,
                "Command Cancelled",
                format!("`{}` was cancelled.", cmd.describe()),
            ),
            ResultType::CommandResult if result.success => Card::new(
                CardKind::Success,
                "Command Succeeded",
                result.message.clone().unwrap_or_else(|| cmd.describe()),
            ),
            ResultType::CommandResult => Card::new(
                CardKind::Failure,
                "Command Failed",
                result.error.clone().unwrap_or_else(|| cmd.describe()),
            ),
        },
    }
}

pub fn render_unexpected(message: impl Into<String>) -> Card {
    Card::new(CardKind::Unexpected, "Unexpected Error", message.into())
}

/// Connection-status notification for the external platform (spec.md §4.I
/// "connection status cards").
pub fn render_connection_status(lifecycle: &ConnectionLifecycle) -> Card {
    match lifecycle {
        ConnectionLifecycle::Connected { guild_id } => Card::new(
            CardKind::ConnectionStatus,
            "Guild Connected",
            format!("`{guild_id}` is now connected."),
        ),
        ConnectionLifecycle::Disconnected { guild_id, reason } => Card::new(
            CardKind::ConnectionStatus,
            "Guild Disconnected",
            format!("`{guild_id}` disconnected: {reason}"),
        ),
        ConnectionLifecycle::Kicked { guild_id, reason, logged_in } => Card::new(
            CardKind::ConnectionStatus,
            "Guild Kicked",
            format!("`{guild_id}` was kicked: {reason} (logged in: {logged_in})"),
        ),
        ConnectionLifecycle::Error { guild_id, message } => Card::new(
            CardKind::ConnectionStatus,
            "Guild Connection Error",
            format!("`{guild_id}`: {message}"),
        ),
        ConnectionLifecycle::Failed { guild_id } => Card::new(
            CardKind::ConnectionStatus,
            "Guild Connection Failed",
            format!("`{guild_id}` exhausted its reconnection attempts."),
        ),
    }
}

/// Notification for an inbound classified record (spec.md §4.I "guild chat,
/// officer chat, event cards"). `None` for records with nothing worth
/// surfacing externally.
pub fn render_classified(guild: &GuildConfig, record: &ClassifiedRecord) -> Option<Card> {
    match record {
        ClassifiedRecord::GuildChat(chat) => {
            let kind = match chat.subtype {
                bridge_types::ChatSubtype::Guild => CardKind::GuildChat,
                bridge_types::ChatSubtype::Officer => CardKind::OfficerChat,
            };
            Some(Card::new(kind, guild.name.clone(), format!("{}: {}", chat.username, chat.message)))
        }
        ClassifiedRecord::Event(event) => {
            if event.kind == Some(EventKind::Online) {
                return None;
            }
            Some(Card::new(CardKind::Event, guild.name.clone(), event.raw.clone()))
        }
        ClassifiedRecord::System(_) | ClassifiedRecord::Unknown { .. } | ClassifiedRecord::Ignored { .. } => None,
    }
}
