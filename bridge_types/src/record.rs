use crate::config::GuildId;

/// Guild chat and officer chat are disjoint channels within one guild
/// (glossary: "Officer chat").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatSubtype {
    Guild,
    Officer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Join,
    Leave,
    Kick,
    Promote,
    Demote,
    Invite,
    Online,
    Level,
    Motd,
    Misc,
}

impl EventKind {
    /// Matches the lowercase event-kind names used in config
    /// (`bridge.interGuild.shareableEvents`) and in §8 scenario 2's
    /// "welcome"/"disconnect" naming, which map onto `Join`/`Leave` here.
    pub fn config_name(self) -> &'static str {
        match self {
            EventKind::Join => "welcome",
            EventKind::Leave => "disconnect",
            EventKind::Kick => "kick",
            EventKind::Promote => "promote",
            EventKind::Demote => "demote",
            EventKind::Invite => "invite",
            EventKind::Online => "online",
            EventKind::Level => "level",
            EventKind::Motd => "motd",
            EventKind::Misc => "misc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRecord {
    pub guild_id: GuildId,
    pub username: String,
    pub rank: Option<String>,
    pub message: String,
    pub subtype: ChatSubtype,
    pub raw: String,
}

#[derive(Debug, Clone, Default)]
pub struct EventRecord {
    pub guild_id: GuildId,
    pub kind: Option<EventKind>,
    pub actor: Option<String>,
    pub target: Option<String>,
    pub from_rank: Option<String>,
    pub to_rank: Option<String>,
    pub reason: Option<String>,
    pub payload: Option<String>,
    pub raw: String,
}

impl EventRecord {
    pub fn new(guild_id: impl Into<GuildId>, kind: EventKind, raw: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            kind: Some(kind),
            raw: raw.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemRecord {
    pub guild_id: GuildId,
    pub system_kind: String,
    pub payload: Option<String>,
    pub raw: String,
}

/// The typed, decoded form of a raw game-server chat line (glossary).
#[derive(Debug, Clone)]
pub enum ClassifiedRecord {
    GuildChat(ChatRecord),
    Event(EventRecord),
    System(SystemRecord),
    Unknown { guild_id: GuildId, raw: String },
    Ignored { raw: String, reason: String },
}

impl ClassifiedRecord {
    pub fn raw(&self) -> &str {
        match self {
            ClassifiedRecord::GuildChat(c) => &c.raw,
            ClassifiedRecord::Event(e) => &e.raw,
            ClassifiedRecord::System(s) => &s.raw,
            ClassifiedRecord::Unknown { raw, .. } => raw,
            ClassifiedRecord::Ignored { raw, .. } => raw,
        }
    }

    pub fn guild_id(&self) -> Option<&GuildId> {
        match self {
            ClassifiedRecord::GuildChat(c) => Some(&c.guild_id),
            ClassifiedRecord::Event(e) => Some(&e.guild_id),
            ClassifiedRecord::System(s) => Some(&s.guild_id),
            ClassifiedRecord::Unknown { guild_id, .. } => Some(guild_id),
            ClassifiedRecord::Ignored { .. } => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, ClassifiedRecord::Ignored { .. })
    }
}
