use super::catalog::{PatternDefinition, PatternGroup};

/// The built-in "classic" flavor: a generic guild-chat game-server dialect
/// matching the examples used throughout spec.md §4 and §8. Additional
/// flavors are registered by `bridge_cli` the same way, via
/// `PatternCatalog::register_many`.
pub fn classic_patterns() -> Vec<PatternDefinition> {
    vec![
        PatternDefinition {
            group: PatternGroup::Ignore,
            kind: "separator",
            pattern: r"^-{5,}.*$",
        },
        PatternDefinition {
            group: PatternGroup::Ignore,
            kind: "afk_notice",
            pattern: r"^You are AFK\.?$",
        },
        PatternDefinition {
            group: PatternGroup::GuildChat,
            kind: "guild_chat",
            pattern: r"^Guild > (?:\[(?P<rank>[^\]]+)\]\s*)?(?P<username>[A-Za-z0-9_]{1,16})(?:\s*\[[^\]]+\])?\s*:\s*(?P<message>.*)$",
        },
        PatternDefinition {
            group: PatternGroup::OfficerChat,
            kind: "officer_chat",
            pattern: r"^Officer > (?:\[(?P<rank>[^\]]+)\]\s*)?(?P<username>[A-Za-z0-9_]{1,16})\s*:\s*(?P<message>.*)$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "join",
            pattern: r"^(?:\[(?P<rank>[^\]]+)\]\s*)?(?P<actor>[A-Za-z0-9_]{1,16}) joined the guild!?$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "leave",
            pattern: r"^(?:\[(?P<rank>[^\]]+)\]\s*)?(?P<actor>[A-Za-z0-9_]{1,16}) left the guild\.?$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "kick",
            pattern: r"^(?P<target>[A-Za-z0-9_]{1,16}) was kicked from the guild by (?P<actor>[A-Za-z0-9_]{1,16})!?$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "promote",
            pattern: r"^(?P<target>[A-Za-z0-9_]{1,16}) was promoted from (?P<from_rank>[\w ]+) to (?P<to_rank>[\w ]+)$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "demote",
            pattern: r"^(?P<target>[A-Za-z0-9_]{1,16}) was demoted from (?P<from_rank>[\w ]+) to (?P<to_rank>[\w ]+)$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "invite",
            pattern: r"^(?P<actor>[A-Za-z0-9_]{1,16}) invited (?P<target>[A-Za-z0-9_]{1,16}) to the guild!?$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "online",
            pattern: r"^Guild members online:\s*(?P<payload>.+)$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "level",
            pattern: r"^The guild has reached Level (?P<payload>\d+)!?$",
        },
        PatternDefinition {
            group: PatternGroup::Event,
            kind: "motd",
            pattern: r"^Message of the day:\s*(?P<payload>.+)$",
        },
        PatternDefinition {
            group: PatternGroup::System,
            kind: "command_error",
            pattern: r"^You cannot invite (?P<target>[A-Za-z0-9_]{1,16}) for another (?P<payload>.+)$",
        },
        PatternDefinition {
            group: PatternGroup::System,
            kind: "disbanded",
            pattern: r"^The guild (?P<payload>.+) has been disbanded!?$",
        },
        PatternDefinition {
            group: PatternGroup::System,
            kind: "mute_result",
            pattern: r"^(?P<target>[A-Za-z0-9_]{1,16}) has been muted for (?P<payload>.+)$",
        },
        PatternDefinition {
            group: PatternGroup::System,
            kind: "unmute_result",
            pattern: r"^(?P<target>[A-Za-z0-9_]{1,16}) has been unmuted$",
        },
        PatternDefinition {
            group: PatternGroup::System,
            kind: "blacklist_result",
            pattern: r"^(?P<target>[A-Za-z0-9_]{1,16}) has been blacklisted!?$",
        },
    ]
}
