use std::sync::Arc;

use bridge_core::{CommandCorrelator, ConnectionSupervisor, SupervisorEvent};
use bridge_types::BridgeConfig;

use crate::client::PlatformClient;
use crate::commands::{self, SlashCommand};
use crate::render;

/// `I` (spec.md §4.I): adapts the supervisor's event stream and the
/// correlator's command outcomes to the external chat platform. Grounded on
/// the teacher's `WebSocketEventHandler` callback boundary, generalized into
/// a struct holding the collaborators it wires together rather than a bag of
/// free functions.
#[derive(Clone)]
pub struct ExternalBridge {
    config: Arc<BridgeConfig>,
    supervisor: Arc<ConnectionSupervisor>,
    correlator: Arc<CommandCorrelator>,
    platform: Arc<dyn PlatformClient>,
}

impl ExternalBridge {
    pub fn new(
        config: Arc<BridgeConfig>,
        supervisor: Arc<ConnectionSupervisor>,
        correlator: Arc<CommandCorrelator>,
        platform: Arc<dyn PlatformClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            supervisor,
            correlator,
            platform,
        })
    }

    /// Subscribes to the supervisor's broadcast and relays every lifecycle
    /// event and classified record to the platform, feeding classified
    /// records to the correlator along the way.
    pub fn spawn_event_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let mut rx = this.supervisor.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => this.handle_supervisor_event(event).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "external bridge lagged behind supervisor broadcast");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }

    async fn handle_supervisor_event(&self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Lifecycle(lifecycle) => {
                let card = render::render_connection_status(&lifecycle);
                self.platform.post_notification(card).await;
            }
            SupervisorEvent::Classified { guild_id, record } => {
                self.correlator.handle_record(&guild_id, &record);
                if let Some(guild) = self.config.guild(&guild_id) {
                    if let Some(card) = render::render_classified(guild, &record) {
                        self.platform.post_notification(card).await;
                    }
                }
            }
        }
    }

    /// `onSlashCommand` (spec.md §6): defers, dispatches, then edits the
    /// reply with the rendered outcome.
    pub async fn handle_slash_command(&self, channel_id: &str, cmd: SlashCommand) {
        self.platform.reply_deferred(channel_id).await;
        let outcome = commands::dispatch(&cmd, &self.config, &self.supervisor, &self.correlator).await;
        let card = render::render_dispatch(&cmd, &outcome);
        self.platform.edit_reply(channel_id, card).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CardKind, MockPlatformClient};
    use crate::commands::MuteScope;
    use bridge_core::{PatternCatalog, StrategyRegistry};
    use bridge_session::MockGameClient;
    use bridge_types::{AccountConfig, AuthMethod, CommandsConfig, GuildConfig, ReconnectionPolicy, ServerConfig};
    use std::time::Duration;

    fn guild(id: &str) -> GuildConfig {
        GuildConfig {
            id: id.into(),
            name: format!("Guild {id}"),
            tag: id.to_uppercase(),
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
                host: "h".into(),
                port: 1,
                version: "1".into(),
            },
            ranks: vec!["Member".into()],
            commands: CommandsConfig {
                allowed_commands: vec!["/g".into(), "/block".into()],
            },
        }
    }

    async fn setup() -> (Arc<MockGameClient>, Arc<ExternalBridge>, Arc<MockPlatformClient>) {
        let client = Arc::new(MockGameClient::new());
        let catalog = Arc::new(PatternCatalog::with_defaults().unwrap());
        let registry = Arc::new(StrategyRegistry::new(catalog.clone()));
        let config = Arc::new(BridgeConfig {
            guilds: vec![guild("a")],
            features: Default::default(),
            advanced: Default::default(),
            bridge: bridge_types::BridgeSettings::default(),
        });
        let supervisor = ConnectionSupervisor::new((*config).clone(), client.clone(), registry, catalog);

        let start_fut = supervisor.start_all();
        tokio::time::sleep(Duration::from_millis(20)).await;
        if let Some(handle) = client.handle_for("a") {
            handle.push_event(bridge_session::GameSessionEvent::Spawn);
        }
        start_fut.await.unwrap();

        let correlator = CommandCorrelator::new();
        let platform = Arc::new(MockPlatformClient::new());
        let bridge = ExternalBridge::new(config, supervisor, correlator, platform.clone());
        bridge.spawn_event_loop();
        (client, bridge, platform)
    }

    #[tokio::test]
    async fn invite_resolves_success_card_on_matching_event() {
        let (client, bridge, platform) = setup().await;

        let bridge_clone = bridge.clone();
        let dispatch_fut = tokio::spawn(async move {
            bridge_clone
                .handle_slash_command(
                    "chan-1",
                    SlashCommand::Invite {
                        guild: "Guild a".into(),
                        username: "Steve".into(),
                    },
                )
                .await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        client
            .handle_for("a")
            .unwrap()
            .push_raw_message("Bot invited Steve to the guild!");

        dispatch_fut.await.unwrap();

        let replies = platform.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1.kind, CardKind::Success);
    }

    #[tokio::test]
    async fn invite_with_no_matching_event_times_out_quickly_when_cancelled() {
        let (_client, bridge, _platform) = setup().await;
        let outcome = commands::dispatch(
            &SlashCommand::Mute {
                guild: "Guild a".into(),
                scope: MuteScope::Player,
                username: Some("St".into()),
                time: "10m".into(),
            },
            &bridge.config,
            &bridge.supervisor,
            &bridge.correlator,
        )
        .await;
        assert!(matches!(outcome, commands::DispatchOutcome::Rejected(_)));
    }
}
