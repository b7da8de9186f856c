use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use bridge_types::{ChatRecord, ChatSubtype, ClassifiedRecord, EventKind, EventRecord, GuildConfig, SystemRecord};

use crate::pattern::{PatternCatalog, PatternGroup};

static COLOR_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"§.").unwrap());

/// Strips color-code escapes unless the guild opted out (spec.md §4.B step
/// 1: "preserveColorCodes"), then trims surrounding whitespace.
fn clean(raw: &str, preserve_color_codes: bool) -> String {
    let stripped = if preserve_color_codes {
        raw.to_string()
    } else {
        COLOR_CODE.replace_all(raw, "").to_string()
    };
    stripped.trim().to_string()
}

/// Lines ending with these suffixes are events even when an overly broad
/// chat pattern would otherwise match them (spec.md §4.B edge case).
fn looks_like_event_tail(message: &str) -> bool {
    let trimmed = message.trim_end_matches('!');
    trimmed.ends_with("joined.") || trimmed.ends_with("left.") || trimmed.ends_with("joined") || trimmed.ends_with("left")
}

/// The 6-step classification pipeline (spec.md §4.B). Never panics and
/// never returns an error: every input line resolves to some
/// [`ClassifiedRecord`] variant, `Unknown` at worst.
pub fn classify(
    raw: &str,
    guild: &GuildConfig,
    catalog: &PatternCatalog,
    preserve_color_codes: bool,
) -> ClassifiedRecord {
    let cleaned = clean(raw, preserve_color_codes);
    let flavor = guild.server.flavor.as_str();

    let ignored = catalog.with_group(flavor, PatternGroup::Ignore, |pats| {
        pats.iter().any(|p| p.regex.is_match(&cleaned))
    });
    if ignored {
        return ClassifiedRecord::Ignored {
            raw: raw.to_string(),
            reason: "filtered_content".to_string(),
        };
    }

    if let Some(record) = try_chat(catalog, flavor, &cleaned, guild, ChatSubtype::Guild, raw) {
        return record;
    }
    if let Some(record) = try_chat(catalog, flavor, &cleaned, guild, ChatSubtype::Officer, raw) {
        return record;
    }
    if let Some(record) = try_event(catalog, flavor, &cleaned, guild, raw) {
        return record;
    }
    if let Some(record) = try_system(catalog, flavor, &cleaned, guild, raw) {
        return record;
    }

    ClassifiedRecord::Unknown {
        guild_id: guild.id.clone(),
        raw: raw.to_string(),
    }
}

fn group_for(subtype: ChatSubtype) -> PatternGroup {
    match subtype {
        ChatSubtype::Guild => PatternGroup::GuildChat,
        ChatSubtype::Officer => PatternGroup::OfficerChat,
    }
}

fn try_chat(
    catalog: &PatternCatalog,
    flavor: &str,
    cleaned: &str,
    guild: &GuildConfig,
    subtype: ChatSubtype,
    raw: &str,
) -> Option<ClassifiedRecord> {
    catalog.with_group(flavor, group_for(subtype), |pats| {
        for pattern in pats {
            let Some(caps) = pattern.regex.captures(cleaned) else {
                continue;
            };
            let message = group(&caps, "message").unwrap_or_default();
            if looks_like_event_tail(&message) {
                continue;
            }
            let username = group(&caps, "username").unwrap_or_default();
            return Some(ClassifiedRecord::GuildChat(ChatRecord {
                guild_id: guild.id.clone(),
                username,
                rank: group(&caps, "rank"),
                message,
                subtype,
                raw: raw.to_string(),
            }));
        }
        None
    })
}

fn event_kind_for(kind: &str) -> EventKind {
    match kind {
        "join" => EventKind::Join,
        "leave" => EventKind::Leave,
        "kick" => EventKind::Kick,
        "promote" => EventKind::Promote,
        "demote" => EventKind::Demote,
        "invite" => EventKind::Invite,
        "online" => EventKind::Online,
        "level" => EventKind::Level,
        "motd" => EventKind::Motd,
        _ => EventKind::Misc,
    }
}

fn try_event(
    catalog: &PatternCatalog,
    flavor: &str,
    cleaned: &str,
    guild: &GuildConfig,
    raw: &str,
) -> Option<ClassifiedRecord> {
    catalog.with_group(flavor, PatternGroup::Event, |pats| {
        for pattern in pats {
            let Some(caps) = pattern.regex.captures(cleaned) else {
                continue;
            };
            let kind = event_kind_for(&pattern.kind);
            return Some(ClassifiedRecord::Event(EventRecord {
                guild_id: guild.id.clone(),
                kind: Some(kind),
                actor: group(&caps, "actor"),
                target: group(&caps, "target"),
                from_rank: group(&caps, "from_rank"),
                to_rank: group(&caps, "to_rank"),
                reason: group(&caps, "reason"),
                payload: normalize_payload(kind, group(&caps, "payload")),
                raw: raw.to_string(),
            }));
        }
        None
    })
}

/// Per-kind payload normalization (spec.md §4.B: numeric fields parsed to
/// integers, online-member lists split on `,` with rank brackets stripped).
fn normalize_payload(kind: EventKind, payload: Option<String>) -> Option<String> {
    match kind {
        EventKind::Level => payload.and_then(|p| p.trim().parse::<i64>().ok()).map(|n| n.to_string()),
        EventKind::Online => payload.map(|p| {
            p.split(',')
                .map(|entry| strip_rank_prefix(entry.trim()))
                .filter(|entry| !entry.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        }),
        _ => payload,
    }
}

/// Strips a leading `[Rank]` prefix (and the whitespace after it) from a
/// single online-member entry.
fn strip_rank_prefix(entry: &str) -> String {
    if let Some(rest) = entry.strip_prefix('[') {
        if let Some((_, after)) = rest.split_once(']') {
            return after.trim().to_string();
        }
    }
    entry.to_string()
}

fn try_system(
    catalog: &PatternCatalog,
    flavor: &str,
    cleaned: &str,
    guild: &GuildConfig,
    raw: &str,
) -> Option<ClassifiedRecord> {
    catalog.with_group(flavor, PatternGroup::System, |pats| {
        for pattern in pats {
            let Some(caps) = pattern.regex.captures(cleaned) else {
                continue;
            };
            let payload = group(&caps, "payload").or_else(|| group(&caps, "target"));
            return Some(ClassifiedRecord::System(SystemRecord {
                guild_id: guild.id.clone(),
                system_kind: pattern.kind.clone(),
                payload,
                raw: raw.to_string(),
            }));
        }
        None
    })
}

fn group(caps: &Captures, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().to_string())
}
