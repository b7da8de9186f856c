mod renderer;

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;

use bridge_types::{
    ChatRecord, ChatSubtype, ClassifiedRecord, EventRecord, GuildConfig, GuildId, MessageHash, PerGuildHistory,
    QueueItem, QueueKind, RateLimitWindow, Stats,
};

use crate::queue::DeliveryQueue;

const MAX_HISTORY_PER_GUILD: usize = 10;
const RETRY_ATTEMPTS: u32 = 3;

/// Fixed relay-format shapes a bounced-back, already-relayed line would take
/// (spec.md §4.G gating step 2: "message text matches any of a fixed set of
/// relay formats").
static RELAY_FORMATS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\[[^\]]+\]\s*\[OFFICER\]\s*[A-Za-z0-9_]+:\s.+$").unwrap(),
        Regex::new(r"^\[[^\]]+\]\s*[A-Za-z0-9_]+:\s.+$").unwrap(),
        Regex::new(r"^[A-Za-z0-9_]+:\s[A-Za-z0-9_]+:\s.+$").unwrap(),
    ]
});

/// `G` (spec.md §4.G): the gating pipeline between classified records and
/// the Delivery Queue. No teacher analogue; the gate chain is modeled as an
/// ordered sequence of predicate checks, in the same style as the teacher's
/// `resolve_event` match arms.
pub struct FanoutEngine {
    config: Arc<bridge_types::BridgeConfig>,
    queue: Arc<DeliveryQueue>,
    histories: Mutex<HashMap<(GuildId, ChatSubtype), PerGuildHistory>>,
    hashes: Mutex<HashMap<u64, MessageHash>>,
    rate_limits: Mutex<HashMap<GuildId, RateLimitWindow>>,
    stats: Arc<Stats>,
}

impl FanoutEngine {
    pub fn new(config: Arc<bridge_types::BridgeConfig>, queue: Arc<DeliveryQueue>, stats: Arc<Stats>) -> Arc<Self> {
        Arc::new(Self {
            config,
            queue,
            histories: Mutex::new(HashMap::new()),
            hashes: Mutex::new(HashMap::new()),
            rate_limits: Mutex::new(HashMap::new()),
            stats,
        })
    }

    /// Entry point the Connection Supervisor's classified-record stream
    /// feeds. System/Unknown/Ignored records are never fanned out.
    pub async fn handle(&self, record: &ClassifiedRecord, source: &GuildConfig) {
        match record {
            ClassifiedRecord::GuildChat(chat) => self.handle_chat(chat, source).await,
            ClassifiedRecord::Event(event) => self.handle_event(event, source).await,
            _ => {}
        }
    }

    fn is_self_echo_or_relay(&self, chat: &ChatRecord, source: &GuildConfig) -> bool {
        if chat.username.eq_ignore_ascii_case(&source.account.username) {
            return true;
        }
        RELAY_FORMATS.iter().any(|re| re.is_match(&chat.message))
    }

    async fn handle_chat(&self, chat: &ChatRecord, source: &GuildConfig) {
        let inter_guild = &self.config.bridge.inter_guild;
        if !inter_guild.enabled {
            return;
        }

        if self.is_self_echo_or_relay(chat, source) {
            self.stats.record_loop_detected();
            return;
        }

        let dup_window = Duration::from_millis(inter_guild.duplicate_detection_window_ms);
        let history_key = (source.id.clone(), chat.subtype);

        {
            let mut histories = self.histories.lock().unwrap();
            let history = histories
                .entry(history_key.clone())
                .or_insert_with(|| PerGuildHistory::new(MAX_HISTORY_PER_GUILD));
            if history.contains_recent(&chat.username, &chat.message, dup_window) {
                self.stats.record_duplicate_dropped();
                return;
            }
        }

        let hash = content_hash(chat.subtype, &chat.username, &chat.message);
        {
            let mut hashes = self.hashes.lock().unwrap();
            let now = Instant::now();
            match hashes.get_mut(&hash) {
                Some(entry) if !entry.is_stale(now, dup_window) => {
                    if entry.count >= inter_guild.max_duplicates_per_window {
                        self.stats.record_duplicate_dropped();
                        return;
                    }
                    entry.record(source.id.clone());
                }
                _ => {
                    hashes.insert(hash, MessageHash::new(hash, source.id.clone()));
                }
            }
        }

        {
            let mut limits = self.rate_limits.lock().unwrap();
            let rl_cfg = &self.config.bridge.rate_limit.inter_guild;
            let window = limits
                .entry(source.id.clone())
                .or_insert_with(|| RateLimitWindow::new(rl_cfg.limit as usize, Duration::from_millis(rl_cfg.window_ms)));
            if !window.check_and_record(Instant::now()) {
                self.stats.record_rate_limited_dropped();
                return;
            }
        }

        self.histories
            .lock()
            .unwrap()
            .entry(history_key)
            .or_insert_with(|| PerGuildHistory::new(MAX_HISTORY_PER_GUILD))
            .push(chat.username.clone(), chat.message.clone());

        if chat.subtype == ChatSubtype::Officer
            && !inter_guild.officer_to_officer_chat
            && !inter_guild.officer_to_guild_chat
        {
            return;
        }

        for target in self.config.enabled_guilds() {
            if target.is_same_guild(source) {
                continue;
            }
            if chat.subtype == ChatSubtype::Officer {
                if inter_guild.officer_to_officer_chat {
                    self.enqueue(target, source, QueueKind::Officer, renderer::render_chat(chat, source, target, inter_guild, true))
                        .await;
                }
                if inter_guild.officer_to_guild_chat {
                    self.enqueue(target, source, QueueKind::Guild, renderer::render_chat(chat, source, target, inter_guild, false))
                        .await;
                }
            } else {
                self.enqueue(target, source, QueueKind::Guild, renderer::render_chat(chat, source, target, inter_guild, false))
                    .await;
            }
        }
    }

    async fn handle_event(&self, event: &EventRecord, source: &GuildConfig) {
        let inter_guild = &self.config.bridge.inter_guild;
        if !inter_guild.enabled {
            return;
        }
        let Some(kind) = event.kind else {
            return;
        };
        if !inter_guild.shareable_events.iter().any(|e| e == kind.config_name()) {
            return;
        }

        for target in self.config.enabled_guilds() {
            if target.is_same_guild(source) {
                continue;
            }
            self.enqueue(
                target,
                source,
                QueueKind::Event,
                renderer::render_event(event, kind, source, target, inter_guild),
            )
            .await;
        }
    }

    async fn enqueue(&self, target: &GuildConfig, source: &GuildConfig, kind: QueueKind, rendered: Option<String>) {
        let Some(text) = rendered else {
            return;
        };
        let item = QueueItem::new(kind, target.id.clone(), source.id.clone(), text, RETRY_ATTEMPTS);
        self.queue.enqueue(item).await;
    }

    /// Periodic sweep (spec.md §4.G "60s maintenance sweep"): evicts stale
    /// cross-guild hashes and caps each per-guild history at its bound.
    pub fn run_maintenance(&self) {
        let window = Duration::from_millis(self.config.bridge.inter_guild.duplicate_detection_window_ms);
        let now = Instant::now();
        self.hashes.lock().unwrap().retain(|_, v| !v.is_stale(now, window));
        for history in self.histories.lock().unwrap().values_mut() {
            history.shrink_to(MAX_HISTORY_PER_GUILD);
        }
    }
}

/// Spawns the 60-second maintenance tick.
pub fn spawn_maintenance(engine: Arc<FanoutEngine>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            engine.run_maintenance();
        }
    });
}

fn content_hash(subtype: ChatSubtype, username: &str, message: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    let subtype_str = match subtype {
        ChatSubtype::Guild => "guild",
        ChatSubtype::Officer => "officer",
    };
    format!("{subtype_str}|{username}|{message}").to_lowercase().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternCatalog;
    use crate::strategy::StrategyRegistry;
    use crate::supervisor::ConnectionSupervisor;
    use bridge_session::MockGameClient;
    use bridge_types::{AccountConfig, AuthMethod, BridgeConfig, CommandsConfig, ReconnectionPolicy, ServerConfig};

    fn guild(id: &str, tag: &str) -> GuildConfig {
        GuildConfig {
            id: id.into(),
            name: format!("Guild {id}"),
            tag: tag.into(),
            enabled: true,
            account: AccountConfig {
                username: format!("Bot{id}"),
                auth_method: AuthMethod::Offline,
                session_path: format!("s{id}"),
                cache_path: format!("c{id}"),
                profiles_folder: format!("p{id}"),
                chat_length_limit: 256,
                reconnection: ReconnectionPolicy::default(),
            },
            server: ServerConfig {
                flavor: "classic".into(),
                host: "h".into(),
                port: 1,
                version: "1".into(),
            },
            ranks: vec![],
            commands: CommandsConfig::default(),
        }
    }

    fn bridge_config(guilds: Vec<GuildConfig>) -> bridge_types::BridgeConfig {
        BridgeConfig {
            guilds,
            features: Default::default(),
            advanced: Default::default(),
            bridge: bridge_types::BridgeSettings::default(),
        }
    }

    async fn setup(guilds: Vec<GuildConfig>) -> (Arc<MockGameClient>, Arc<ConnectionSupervisor>, Arc<FanoutEngine>, Arc<Stats>) {
        let client = Arc::new(MockGameClient::new());
        let catalog = Arc::new(PatternCatalog::with_defaults().unwrap());
        let registry = Arc::new(StrategyRegistry::new(catalog.clone()));
        let config = Arc::new(bridge_config(guilds));
        let supervisor = ConnectionSupervisor::new((*config).clone(), client.clone(), registry, catalog);

        let start_fut = supervisor.start_all();
        tokio::time::sleep(Duration::from_millis(20)).await;
        for guild in config.enabled_guilds() {
            if let Some(handle) = client.handle_for(&guild.id) {
                handle.push_event(bridge_session::GameSessionEvent::Spawn);
            }
        }
        start_fut.await.unwrap();

        let stats = Arc::new(Stats::default());
        let queue = DeliveryQueue::spawn(supervisor.clone(), stats.clone());
        let engine = FanoutEngine::new(config, queue, stats.clone());
        (client, supervisor, engine, stats)
    }

    #[tokio::test]
    async fn guild_chat_fans_out_to_other_guild() {
        let (client, _supervisor, engine, _stats) = setup(vec![guild("a", "A"), guild("b", "B")]).await;
        let source = guild("a", "A");
        let chat = ChatRecord {
            guild_id: "a".into(),
            username: "Alice".into(),
            rank: None,
            message: "hello everyone".into(),
            subtype: ChatSubtype::Guild,
            raw: "Guild > Alice: hello everyone".into(),
        };
        engine.handle(&ClassifiedRecord::GuildChat(chat), &source).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let sent = client.handle_for("b").unwrap().sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Alice: hello everyone"));
    }

    #[tokio::test]
    async fn self_echo_username_never_fans_out() {
        let (client, _supervisor, engine, stats) = setup(vec![guild("a", "A"), guild("b", "B")]).await;
        let source = guild("a", "A");
        let chat = ChatRecord {
            guild_id: "a".into(),
            username: "BotA".into(),
            rank: None,
            message: "[B] Alice: relayed".into(),
            subtype: ChatSubtype::Guild,
            raw: "Guild > BotA: [B] Alice: relayed".into(),
        };
        engine.handle(&ClassifiedRecord::GuildChat(chat), &source).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(client.handle_for("b").unwrap().sent_messages().is_empty());
        assert_eq!(stats.snapshot().loops_detected, 1);
    }

    #[tokio::test]
    async fn rate_limit_drops_excess_messages_within_window() {
        let (_client, _supervisor, engine, stats) = setup(vec![guild("a", "A"), guild("b", "B")]).await;
        let source = guild("a", "A");
        for i in 0..5 {
            let chat = ChatRecord {
                guild_id: "a".into(),
                username: "Alice".into(),
                rank: None,
                message: format!("message {i}"),
                subtype: ChatSubtype::Guild,
                raw: format!("Guild > Alice: message {i}"),
            };
            engine.handle(&ClassifiedRecord::GuildChat(chat), &source).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(stats.snapshot().rate_limited_dropped > 0);
    }
}
