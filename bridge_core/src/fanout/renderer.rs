use bridge_types::{ChatRecord, EventKind, EventRecord, GuildConfig, InterGuildConfig};

use crate::util::truncate_for_chat;

fn prefix(source: &GuildConfig, cfg: &InterGuildConfig) -> String {
    let mut prefix = String::new();
    if cfg.show_source_tag {
        prefix.push_str("[SRC] ");
    }
    if cfg.show_tags {
        prefix.push_str(&format!("[{}] ", source.tag));
    }
    prefix
}

/// Renders a fanned-out chat line for `target` (spec.md §4.G Renderer:
/// `showTags`, `showSourceTag`, officer-prefix, truncation rules identical
/// to `D.sendMessage`).
pub fn render_chat(
    chat: &ChatRecord,
    source: &GuildConfig,
    target: &GuildConfig,
    cfg: &InterGuildConfig,
    officer_prefix: bool,
) -> Option<String> {
    let mut line = prefix(source, cfg);
    if officer_prefix {
        line.push_str("[OFFICER] ");
    }
    line.push_str(&chat.username);
    line.push_str(": ");
    line.push_str(&chat.message);
    Some(truncate_for_chat(&line, target.account.chat_length_limit))
}

/// Renders a fanned-out event line, `None` for kinds with nothing worth
/// relaying verbatim (spec.md §4.G event-kind allow-list).
pub fn render_event(
    event: &EventRecord,
    kind: EventKind,
    source: &GuildConfig,
    target: &GuildConfig,
    cfg: &InterGuildConfig,
) -> Option<String> {
    let body = match kind {
        EventKind::Join => format!("{} joined the guild.", event.actor.as_deref().unwrap_or("someone")),
        EventKind::Leave => format!("{} left the guild.", event.actor.as_deref().unwrap_or("someone")),
        EventKind::Kick => format!(
            "{} was kicked by {}.",
            event.target.as_deref().unwrap_or("someone"),
            event.actor.as_deref().unwrap_or("an officer")
        ),
        EventKind::Promote => format!(
            "{} was promoted to {}.",
            event.target.as_deref().unwrap_or("someone"),
            event.to_rank.as_deref().unwrap_or("a higher rank")
        ),
        EventKind::Demote => format!(
            "{} was demoted to {}.",
            event.target.as_deref().unwrap_or("someone"),
            event.to_rank.as_deref().unwrap_or("a lower rank")
        ),
        EventKind::Invite => format!(
            "{} invited {}.",
            event.actor.as_deref().unwrap_or("someone"),
            event.target.as_deref().unwrap_or("someone")
        ),
        EventKind::Level => format!("The guild reached level {}.", event.payload.as_deref().unwrap_or("?")),
        EventKind::Motd => format!("MOTD updated: {}", event.payload.as_deref().unwrap_or("")),
        EventKind::Online => return None,
        EventKind::Misc => event.raw.clone(),
    };

    let line = format!("{}{body}", prefix(source, cfg));
    Some(truncate_for_chat(&line, target.account.chat_length_limit))
}
