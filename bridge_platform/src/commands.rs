use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use bridge_core::{ConnectionSupervisor, CommandCorrelator};
use bridge_types::{BridgeConfig, CommandKind, CorrelatorResult, GuildConfig};

/// `correlator default timeout` (spec.md §4.I / §5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,16}$").unwrap());
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+[smhd])+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteScope {
    Global,
    Player,
}

/// The platform-level slash-command surface (spec.md §6).
#[derive(Debug, Clone)]
pub enum SlashCommand {
    Invite { guild: String, username: String },
    Kick { guild: String, username: String, reason: String },
    Promote { guild: String, username: String },
    Demote { guild: String, username: String },
    SetRank { guild: String, username: String, rank: String },
    Mute { guild: String, scope: MuteScope, username: Option<String>, time: String },
    Unmute { guild: String, scope: MuteScope, username: Option<String> },
    Blacklist { guild: String, username: String },
    Execute { guild: String, raw: String },
}

impl SlashCommand {
    pub fn guild_name(&self) -> &str {
        match self {
            SlashCommand::Invite { guild, .. }
            | SlashCommand::Kick { guild, .. }
            | SlashCommand::Promote { guild, .. }
            | SlashCommand::Demote { guild, .. }
            | SlashCommand::SetRank { guild, .. }
            | SlashCommand::Mute { guild, .. }
            | SlashCommand::Unmute { guild, .. }
            | SlashCommand::Blacklist { guild, .. }
            | SlashCommand::Execute { guild, .. } => guild,
        }
    }

    /// Human-readable description, used in rendered cards.
    pub fn describe(&self) -> String {
        match self {
            SlashCommand::Invite { username, .. } => format!("invite {username}"),
            SlashCommand::Kick { username, reason, .. } => format!("kick {username} ({reason})"),
            SlashCommand::Promote { username, .. } => format!("promote {username}"),
            SlashCommand::Demote { username, .. } => format!("demote {username}"),
            SlashCommand::SetRank { username, rank, .. } => format!("setrank {username} to {rank}"),
            SlashCommand::Mute { scope: MuteScope::Global, time, .. } => format!("mute everyone for {time}"),
            SlashCommand::Mute { username, time, .. } => {
                format!("mute {} for {time}", username.as_deref().unwrap_or("?"))
            }
            SlashCommand::Unmute { scope: MuteScope::Global, .. } => "unmute everyone".to_string(),
            SlashCommand::Unmute { username, .. } => format!("unmute {}", username.as_deref().unwrap_or("?")),
            SlashCommand::Blacklist { username, .. } => format!("blacklist {username}"),
            SlashCommand::Execute { raw, .. } => format!("execute `{raw}`"),
        }
    }
}

pub enum DispatchOutcome {
    Resolved(CorrelatorResult),
    Rejected(String),
}

fn validate_username(username: &str) -> Result<(), String> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(format!("`{username}` is not a valid game username"))
    }
}

fn validate_time(time: &str) -> Result<(), String> {
    if TIME_RE.is_match(time) {
        Ok(())
    } else {
        Err(format!("`{time}` is not a valid duration (expected e.g. `10m`, `1h30m`)"))
    }
}

fn validate_rank(guild: &GuildConfig, rank: &str) -> Result<(), String> {
    if guild.has_rank(rank) {
        Ok(())
    } else {
        Err(format!("`{rank}` is not a configured rank for {}", guild.name))
    }
}

/// Builds the `{kind, target, command_text}` triple the correlator listens
/// for (spec.md §6's per-command grammars), after validating arguments.
fn build(cmd: &SlashCommand, guild: &GuildConfig) -> Result<(CommandKind, Option<String>, String), String> {
    match cmd {
        SlashCommand::Invite { username, .. } => {
            validate_username(username)?;
            Ok((CommandKind::Invite, Some(username.clone()), format!("/g invite {username}")))
        }
        SlashCommand::Kick { username, reason, .. } => {
            validate_username(username)?;
            Ok((CommandKind::Kick, Some(username.clone()), format!("/g kick {username} {reason}")))
        }
        SlashCommand::Promote { username, .. } => {
            validate_username(username)?;
            Ok((CommandKind::Promote, Some(username.clone()), format!("/g promote {username}")))
        }
        SlashCommand::Demote { username, .. } => {
            validate_username(username)?;
            Ok((CommandKind::Demote, Some(username.clone()), format!("/g demote {username}")))
        }
        SlashCommand::SetRank { username, rank, .. } => {
            validate_username(username)?;
            validate_rank(guild, rank)?;
            Ok((CommandKind::SetRank, Some(username.clone()), format!("/g setrank {username} {rank}")))
        }
        SlashCommand::Mute { scope, username, time, .. } => {
            validate_time(time)?;
            match scope {
                MuteScope::Global => Ok((CommandKind::Mute, None, format!("/g mute everyone {time}"))),
                MuteScope::Player => {
                    let username = username.as_deref().ok_or_else(|| "player mute requires a username".to_string())?;
                    validate_username(username)?;
                    Ok((CommandKind::Mute, Some(username.to_string()), format!("/g mute {username} {time}")))
                }
            }
        }
        SlashCommand::Unmute { scope, username, .. } => match scope {
            MuteScope::Global => Ok((CommandKind::Unmute, None, "/g unmute everyone".to_string())),
            MuteScope::Player => {
                let username = username.as_deref().ok_or_else(|| "player unmute requires a username".to_string())?;
                validate_username(username)?;
                Ok((CommandKind::Unmute, Some(username.to_string()), format!("/g unmute {username}")))
            }
        },
        SlashCommand::Blacklist { username, .. } => {
            validate_username(username)?;
            Ok((CommandKind::Blacklist, Some(username.clone()), format!("/block add {username}")))
        }
        SlashCommand::Execute { raw, .. } => {
            let lower = raw.to_ascii_lowercase();
            if lower.starts_with("/g ") || lower.starts_with("/guild ") || lower == "/g" || lower == "/guild" {
                return Err("raw execute may not issue `/g`/`/guild` commands; use the dedicated command".into());
            }
            Ok((CommandKind::Execute, None, raw.clone()))
        }
    }
}

/// Validates, constructs the game-server command, registers a correlator
/// listener, dispatches via the supervisor, and awaits the result
/// (spec.md §4.I).
pub async fn dispatch(
    cmd: &SlashCommand,
    config: &BridgeConfig,
    supervisor: &Arc<ConnectionSupervisor>,
    correlator: &Arc<CommandCorrelator>,
) -> DispatchOutcome {
    let Some(guild) = config
        .guilds
        .iter()
        .find(|g| g.name.eq_ignore_ascii_case(cmd.guild_name()) || g.id == cmd.guild_name())
    else {
        return DispatchOutcome::Rejected(format!("unknown guild `{}`", cmd.guild_name()));
    };

    if !guild.enabled {
        return DispatchOutcome::Rejected(format!("guild `{}` is disabled", guild.name));
    }
    if !supervisor.is_connected(&guild.id) {
        return DispatchOutcome::Rejected(format!("guild `{}` is not connected", guild.name));
    }

    let (kind, target, command_text) = match build(cmd, guild) {
        Ok(parts) => parts,
        Err(reason) => return DispatchOutcome::Rejected(reason),
    };

    let (_listener_id, rx) =
        correlator.create_listener(guild.id.clone(), kind, target, command_text.clone(), DEFAULT_TIMEOUT);

    if let Err(e) = supervisor.execute_command(&guild.id, &command_text).await {
        return DispatchOutcome::Rejected(e.to_string());
    }

    DispatchOutcome::Resolved(CommandCorrelator::wait_for_result(rx).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_grammar_matches_spec() {
        assert!(USERNAME_RE.is_match("Steve_1"));
        assert!(!USERNAME_RE.is_match("ab"));
        assert!(!USERNAME_RE.is_match("has space"));
    }

    #[test]
    fn time_grammar_matches_spec() {
        assert!(TIME_RE.is_match("10m"));
        assert!(TIME_RE.is_match("1h30m"));
        assert!(!TIME_RE.is_match("soon"));
    }

    #[test]
    fn execute_rejects_guild_prefixed_raw_commands() {
        let guild = sample_guild();
        let cmd = SlashCommand::Execute {
            guild: guild.name.clone(),
            raw: "/g disband".into(),
        };
        assert!(build(&cmd, &guild).is_err());
    }

    #[test]
    fn setrank_rejects_rank_outside_guild_config() {
        let guild = sample_guild();
        let cmd = SlashCommand::SetRank {
            guild: guild.name.clone(),
            username: "Steve".into(),
            rank: "Emperor".into(),
        };
        assert!(build(&cmd, &guild).is_err());
    }

    fn sample_guild() -> GuildConfig {
        GuildConfig {
            id: "a".into(),
            name: "Guild A".into(),
            tag: "GA".into(),
            enabled: true,
            account: bridge_types::AccountConfig {
                username: "Bot".into(),
                auth_method: bridge_types::AuthMethod::Offline,
                session_path: "s".into(),
                cache_path: "c".into(),
                profiles_folder: "p".into(),
                chat_length_limit: 256,
                reconnection: bridge_types::ReconnectionPolicy::default(),
            },
            server: bridge_types::ServerConfig {
                flavor: "classic".into(),
                host: "h".into(),
                port: 1,
                version: "1".into(),
            },
            ranks: vec!["Member".into(), "Officer".into()],
            commands: bridge_types::CommandsConfig {
                allowed_commands: vec!["/g".into(), "/block".into()],
            },
        }
    }
}
