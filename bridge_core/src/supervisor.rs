use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use kanal::AsyncReceiver;
use tokio::sync::broadcast;

use bridge_session::GameClient;
use bridge_types::{BridgeConfig, BridgeError, ClassifiedRecord, GuildConfig, GuildId, Result};

use crate::connection::{self, ConnectionEvent, GuildConnectionHandle};
use crate::pattern::PatternCatalog;
use crate::strategy::StrategyRegistry;

/// Connection-lifecycle half of [`SupervisorEvent`] (spec.md §4.E: "fans
/// connection lifecycle ... upward").
#[derive(Debug, Clone)]
pub enum ConnectionLifecycle {
    Connected { guild_id: GuildId },
    Disconnected { guild_id: GuildId, reason: String },
    Kicked { guild_id: GuildId, reason: String, logged_in: bool },
    Error { guild_id: GuildId, message: String },
    Failed { guild_id: GuildId },
}

/// What the Connection Supervisor broadcasts to every subscriber (the
/// Fan-out Engine, the Command Correlator's feed, and `bridge_platform`),
/// per SPEC_FULL.md §9's "typed channels/observer traits, not dynamically
/// attached listeners" decision.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    Lifecycle(ConnectionLifecycle),
    Classified {
        guild_id: GuildId,
        record: Arc<ClassifiedRecord>,
    },
}

const BROADCAST_CAPACITY: usize = 1024;

/// `E` (spec.md §4.E): owns every guild's connection handle, schedules
/// reconnects, and rebroadcasts what each connection actor reports.
/// Grounded on `rucord_ws::websocket_manager::WebSocketManager` +
/// `shard_bucket::ShardBucket`.
pub struct ConnectionSupervisor {
    config: BridgeConfig,
    game_client: Arc<dyn GameClient>,
    strategy_registry: Arc<StrategyRegistry>,
    catalog: Arc<PatternCatalog>,
    connections: Mutex<HashMap<GuildId, GuildConnectionHandle>>,
    reconnect_timers: Mutex<HashMap<GuildId, tokio::task::JoinHandle<()>>>,
    events_tx_internal: kanal::AsyncSender<ConnectionEvent>,
    broadcast_tx: broadcast::Sender<SupervisorEvent>,
}

impl ConnectionSupervisor {
    pub fn new(
        config: BridgeConfig,
        game_client: Arc<dyn GameClient>,
        strategy_registry: Arc<StrategyRegistry>,
        catalog: Arc<PatternCatalog>,
    ) -> Arc<Self> {
        let (events_tx_internal, events_rx_internal) = kanal::unbounded_async::<ConnectionEvent>();
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        let supervisor = Arc::new(Self {
            config,
            game_client,
            strategy_registry,
            catalog,
            connections: Mutex::new(HashMap::new()),
            reconnect_timers: Mutex::new(HashMap::new()),
            events_tx_internal,
            broadcast_tx,
        });

        let weak = Arc::downgrade(&supervisor);
        tokio::spawn(fan_in_loop(events_rx_internal, weak));

        supervisor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// `startAll` (spec.md §4.E): spawns and connects every enabled guild
    /// concurrently, tolerating individual failures.
    pub async fn start_all(self: &Arc<Self>) -> Result<()> {
        let enabled: Vec<GuildConfig> = self.config.enabled_guilds().cloned().collect();
        if enabled.is_empty() {
            return Err(BridgeError::Config("no enabled guilds configured".into()));
        }

        let results = futures::future::join_all(enabled.iter().map(|g| self.spawn_and_connect(g))).await;
        let successes = results.iter().filter(|r| r.is_ok()).count();
        if successes == 0 {
            return Err(BridgeError::Internal(
                "no guild connections could be established".into(),
            ));
        }
        Ok(())
    }

    async fn spawn_and_connect(self: &Arc<Self>, guild: &GuildConfig) -> Result<()> {
        let strategy = self.strategy_registry.for_flavor(&guild.server.flavor);
        let handle = connection::spawn(
            guild.clone(),
            self.game_client.clone(),
            strategy,
            self.catalog.clone(),
            self.config.features.chat_parser.preserve_color_codes,
            self.events_tx_internal.clone(),
        );
        self.connections
            .lock()
            .unwrap()
            .insert(guild.id.clone(), handle.clone());
        handle.connect().await
    }

    /// `stopAll` (spec.md §4.E): cancels pending reconnect timers before
    /// disconnecting connections, so a timer can't race a shutdown and
    /// resurrect a connection that's being torn down.
    pub async fn stop_all(&self) {
        let timers: Vec<_> = self.reconnect_timers.lock().unwrap().drain().collect();
        for (_, handle) in timers {
            handle.abort();
        }

        let handles: Vec<GuildConnectionHandle> =
            self.connections.lock().unwrap().values().cloned().collect();
        futures::future::join_all(handles.iter().map(|h| h.disconnect(true))).await;
    }

    /// `scheduleReconnect` (spec.md §4.E). Replaces any existing timer for
    /// the guild rather than stacking reconnect attempts.
    pub fn schedule_reconnect(self: &Arc<Self>, guild_id: &str) {
        let Some(guild) = self.config.guild(guild_id) else {
            return;
        };
        if !guild.account.reconnection.enabled {
            return;
        }

        if let Some(prev) = self.reconnect_timers.lock().unwrap().remove(guild_id) {
            prev.abort();
        }

        let supervisor = Arc::clone(self);
        let guild_id = guild_id.to_string();
        let task = tokio::spawn(async move {
            let conn = supervisor.connections.lock().unwrap().get(&guild_id).cloned();
            if let Some(conn) = conn {
                let _ = conn.reconnect().await;
            }
            supervisor.reconnect_timers.lock().unwrap().remove(&guild_id);
        });
        self.reconnect_timers.lock().unwrap().insert(guild_id, task);
    }

    pub fn is_connected(&self, guild_id: &str) -> bool {
        self.connections
            .lock()
            .unwrap()
            .get(guild_id)
            .map(|h| h.is_connected())
            .unwrap_or(false)
    }

    fn handle_for(&self, guild_id: &str) -> Result<GuildConnectionHandle> {
        self.connections
            .lock()
            .unwrap()
            .get(guild_id)
            .cloned()
            .ok_or_else(|| BridgeError::Internal(format!("unknown guild {guild_id}")))
    }

    /// `sendMessage`, guarded by `isConnected` (spec.md §4.E).
    pub async fn send_message(&self, guild_id: &str, text: &str) -> Result<()> {
        if !self.is_connected(guild_id) {
            return Err(BridgeError::Network(format!("guild {guild_id} is not connected")));
        }
        self.handle_for(guild_id)?.send_message(text).await
    }

    pub async fn send_officer_message(&self, guild_id: &str, text: &str) -> Result<()> {
        if !self.is_connected(guild_id) {
            return Err(BridgeError::Network(format!("guild {guild_id} is not connected")));
        }
        self.handle_for(guild_id)?.send_officer_message(text).await
    }

    /// `executeCommand`, guarded by `isConnected` (spec.md §4.E).
    pub async fn execute_command(&self, guild_id: &str, command: &str) -> Result<()> {
        if !self.is_connected(guild_id) {
            return Err(BridgeError::Network(format!("guild {guild_id} is not connected")));
        }
        self.handle_for(guild_id)?.execute_command(command).await
    }
}

async fn fan_in_loop(rx: AsyncReceiver<ConnectionEvent>, supervisor: Weak<ConnectionSupervisor>) {
    while let Ok(event) = rx.recv().await {
        let Some(supervisor) = supervisor.upgrade() else {
            return;
        };

        match event {
            ConnectionEvent::Connected { guild_id } => {
                let _ = supervisor
                    .broadcast_tx
                    .send(SupervisorEvent::Lifecycle(ConnectionLifecycle::Connected { guild_id }));
            }
            ConnectionEvent::Disconnected { guild_id, reason } => {
                tracing::info!(guild_id = %guild_id, reason, "guild connection disconnected");
                supervisor.schedule_reconnect(&guild_id);
                let _ = supervisor.broadcast_tx.send(SupervisorEvent::Lifecycle(
                    ConnectionLifecycle::Disconnected { guild_id, reason },
                ));
            }
            ConnectionEvent::Kicked {
                guild_id,
                reason,
                logged_in,
            } => {
                tracing::warn!(guild_id = %guild_id, reason, logged_in, "guild connection kicked");
                supervisor.schedule_reconnect(&guild_id);
                let _ = supervisor.broadcast_tx.send(SupervisorEvent::Lifecycle(
                    ConnectionLifecycle::Kicked {
                        guild_id,
                        reason,
                        logged_in,
                    },
                ));
            }
            ConnectionEvent::Error { guild_id, message } => {
                tracing::warn!(guild_id = %guild_id, message, "guild connection error");
                let _ = supervisor
                    .broadcast_tx
                    .send(SupervisorEvent::Lifecycle(ConnectionLifecycle::Error { guild_id, message }));
            }
            ConnectionEvent::Failed { guild_id } => {
                tracing::error!(guild_id = %guild_id, "guild connection failed permanently");
                let _ = supervisor
                    .broadcast_tx
                    .send(SupervisorEvent::Lifecycle(ConnectionLifecycle::Failed { guild_id }));
            }
            ConnectionEvent::Classified { guild_id, record } => {
                let _ = supervisor.broadcast_tx.send(SupervisorEvent::Classified {
                    guild_id,
                    record: Arc::new(record),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyRegistry;
    use bridge_session::MockGameClient;
    use bridge_types::{AccountConfig, AuthMethod, CommandsConfig, ReconnectionPolicy, ServerConfig};

    fn sample_config() -> BridgeConfig {
        BridgeConfig {
            guilds: vec![GuildConfig {
                id: "guildA".into(),
                name: "Guild A".into(),
                tag: "GA".into(),
                enabled: true,
                account: AccountConfig {
                    username: "Bot".into(),
                    auth_method: AuthMethod::Offline,
                    session_path: "s".into(),
                    cache_path: "c".into(),
                    profiles_folder: "p".into(),
                    chat_length_limit: 256,
                    reconnection: ReconnectionPolicy::default(),
                },
                server: ServerConfig {
                    flavor: "classic".into(),
                    host: "localhost".into(),
                    port: 1,
                    version: "1".into(),
                },
                ranks: vec![],
                commands: CommandsConfig::default(),
            }],
            features: Default::default(),
            advanced: Default::default(),
            bridge: bridge_types::BridgeSettings::default(),
        }
    }

    #[tokio::test]
    async fn start_all_connects_enabled_guilds() {
        let client = Arc::new(MockGameClient::new());
        let catalog = Arc::new(PatternCatalog::with_defaults().unwrap());
        let registry = Arc::new(StrategyRegistry::new(catalog.clone()));
        let supervisor = ConnectionSupervisor::new(sample_config(), client.clone(), registry, catalog);

        let start_fut = supervisor.start_all();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if let Some(handle) = client.handle_for("guildA") {
            handle.push_event(bridge_session::GameSessionEvent::Spawn);
        }
        start_fut.await.unwrap();

        assert!(supervisor.is_connected("guildA"));
    }

    #[tokio::test]
    async fn send_message_rejected_when_not_connected() {
        let client = Arc::new(MockGameClient::new());
        let catalog = Arc::new(PatternCatalog::with_defaults().unwrap());
        let registry = Arc::new(StrategyRegistry::new(catalog.clone()));
        let supervisor = ConnectionSupervisor::new(sample_config(), client, registry, catalog);

        let result = supervisor.send_message("guildA", "hello").await;
        assert!(result.is_err());
    }
}
