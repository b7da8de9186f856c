use serde::{Deserialize, Serialize};

pub type GuildId = String;

/// Root of the hierarchical configuration described in spec.md §6. Loaded
/// once at startup and treated as immutable for the lifetime of the
/// process (spec.md §3: `GuildConfig` is "immutable after load").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub guilds: Vec<GuildConfig>,

    #[serde(default)]
    pub features: FeaturesConfig,

    #[serde(default)]
    pub advanced: AdvancedConfig,

    #[serde(default)]
    pub bridge: BridgeSettings,
}

impl BridgeConfig {
    pub fn enabled_guilds(&self) -> impl Iterator<Item = &GuildConfig> {
        self.guilds.iter().filter(|g| g.enabled)
    }

    pub fn guild(&self, id: &str) -> Option<&GuildConfig> {
        self.guilds.iter().find(|g| g.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildConfig {
    pub id: GuildId,
    pub name: String,
    pub tag: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub account: AccountConfig,
    pub server: ServerConfig,

    #[serde(default)]
    pub ranks: Vec<String>,

    #[serde(default)]
    pub commands: CommandsConfig,
}

impl GuildConfig {
    /// Same-guild suppression (spec.md glossary): two guild configs name
    /// the same guild if any of id/name/tag match.
    pub fn is_same_guild(&self, other: &GuildConfig) -> bool {
        self.id == other.id
            || self.name.eq_ignore_ascii_case(&other.name)
            || self.tag.eq_ignore_ascii_case(&other.tag)
    }

    pub fn has_rank(&self, rank: &str) -> bool {
        self.ranks.iter().any(|r| r.eq_ignore_ascii_case(rank))
    }

    pub fn allows_command(&self, first_token: &str) -> bool {
        self.commands
            .allowed_commands
            .iter()
            .any(|c| c.eq_ignore_ascii_case(first_token))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub username: String,

    pub auth_method: AuthMethod,

    pub session_path: String,
    pub cache_path: String,
    pub profiles_folder: String,

    #[serde(default = "default_chat_length_limit")]
    pub chat_length_limit: usize,

    pub reconnection: ReconnectionPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Microsoft,
    Offline,
    Token,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectionPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Keys into the Pattern Catalog (spec.md §4.A) and Server Strategy
    /// registry (spec.md §4.C).
    pub flavor: String,
    pub host: String,
    pub port: u16,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default)]
    pub allowed_commands: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub chat_parser: ChatParserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatParserConfig {
    /// If true, Classifier step 1 (spec.md §4.B) does not strip color-code
    /// escapes before matching.
    #[serde(default)]
    pub preserve_color_codes: bool,
}

impl Default for ChatParserConfig {
    fn default() -> Self {
        Self {
            preserve_color_codes: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedConfig {
    #[serde(default)]
    pub message_cleaner: MessageCleanerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCleanerConfig {
    #[serde(default = "default_chat_length_limit")]
    pub max_length: usize,
}

impl Default for MessageCleanerConfig {
    fn default() -> Self {
        Self {
            max_length: default_chat_length_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default)]
    pub inter_guild: InterGuildConfig,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            inter_guild: InterGuildConfig::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterGuildConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub officer_to_guild_chat: bool,

    #[serde(default = "default_true")]
    pub officer_to_officer_chat: bool,

    #[serde(default = "default_true")]
    pub show_tags: bool,

    #[serde(default = "default_true")]
    pub show_source_tag: bool,

    #[serde(default = "default_shareable_events")]
    pub shareable_events: Vec<String>,

    /// Redesign flag (spec.md §9): hard-coded in the source, promoted to
    /// configuration here.
    #[serde(default = "default_dup_window_ms")]
    pub duplicate_detection_window_ms: u64,

    #[serde(default = "default_max_duplicates")]
    pub max_duplicates_per_window: u32,
}

impl Default for InterGuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            officer_to_guild_chat: false,
            officer_to_officer_chat: true,
            show_tags: true,
            show_source_tag: true,
            shareable_events: default_shareable_events(),
            duplicate_detection_window_ms: default_dup_window_ms(),
            max_duplicates_per_window: default_max_duplicates(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default)]
    pub inter_guild: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit")]
    pub limit: u32,

    #[serde(default = "default_rate_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_rate_limit(),
            window_ms: default_rate_window_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_chat_length_limit() -> usize {
    256
}

fn default_retry_delay_ms() -> u64 {
    30_000
}

fn default_dup_window_ms() -> u64 {
    30_000
}

fn default_max_duplicates() -> u32 {
    2
}

fn default_rate_limit() -> u32 {
    2
}

fn default_rate_window_ms() -> u64 {
    10_000
}

fn default_shareable_events() -> Vec<String> {
    [
        "welcome",
        "disconnect",
        "kick",
        "promote",
        "demote",
        "level",
        "motd",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_guild(id: &str) -> GuildConfig {
        GuildConfig {
            id: id.into(),
            name: format!("Guild {id}"),
            tag: id.to_uppercase(),
            enabled: true,
            account: AccountConfig {
                username: "Bot".into(),
                auth_method: AuthMethod::Offline,
                session_path: "session".into(),
                cache_path: "cache".into(),
                profiles_folder: "profiles".into(),
                chat_length_limit: 256,
                reconnection: ReconnectionPolicy::default(),
            },
            server: ServerConfig {
                flavor: "classic".into(),
                host: "localhost".into(),
                port: 25565,
                version: "1".into(),
            },
            ranks: vec!["Member".into(), "Officer".into()],
            commands: CommandsConfig {
                allowed_commands: vec!["/g".into()],
            },
        }
    }

    #[test]
    fn same_guild_matches_on_id_name_or_tag() {
        let a = sample_guild("a");
        let mut b = sample_guild("b");
        assert!(!a.is_same_guild(&b));

        b.tag = a.tag.clone();
        assert!(a.is_same_guild(&b));
    }

    #[test]
    fn rank_lookup_is_case_insensitive() {
        let g = sample_guild("a");
        assert!(g.has_rank("officer"));
        assert!(!g.has_rank("leader"));
    }

    #[test]
    fn default_inter_guild_config_has_spec_constants() {
        let cfg = InterGuildConfig::default();
        assert_eq!(cfg.duplicate_detection_window_ms, 30_000);
        assert_eq!(cfg.max_duplicates_per_window, 2);
        assert!(cfg.shareable_events.contains(&"kick".to_string()));
    }
}
