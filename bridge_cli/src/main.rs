use std::sync::Arc;

use bridge_core::{
    CommandCorrelator, ConnectionSupervisor, DeliveryQueue, FanoutEngine, PatternCatalog, StrategyRegistry,
    SupervisorEvent,
};
use bridge_platform::{ExternalBridge, MockPlatformClient};
use bridge_session::MockGameClient;
use bridge_types::{BridgeConfig, Stats};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "bridge.config.json".to_string());
    let config = Arc::new(load_config(&config_path));

    let catalog = Arc::new(
        PatternCatalog::with_defaults().expect("built-in classic patterns are always valid"),
    );
    let registry = Arc::new(StrategyRegistry::new(catalog.clone()));

    // No concrete game-client implementation ships in this workspace (spec.md
    // §1: the external chat client library is an out-of-scope collaborator).
    // This wiring uses the in-memory mock so the construction graph below is
    // exercisable end to end.
    let game_client: Arc<dyn bridge_session::GameClient> = Arc::new(MockGameClient::new());

    let supervisor = ConnectionSupervisor::new((*config).clone(), game_client, registry, catalog);
    if let Err(e) = supervisor.start_all().await {
        tracing::error!(error = %e, "failed to start any guild connection");
        return;
    }

    let stats = Arc::new(Stats::default());
    let queue = DeliveryQueue::spawn(supervisor.clone(), stats.clone());
    let fanout = FanoutEngine::new(config.clone(), queue, stats);
    bridge_core::fanout::spawn_maintenance(fanout.clone());
    spawn_fanout_consumer(config.clone(), supervisor.clone(), fanout);

    let correlator = CommandCorrelator::new();
    // As with the game client, no concrete platform adapter ships here
    // (spec.md §1); the mock lets the wiring run and be exercised manually.
    let platform: Arc<dyn bridge_platform::PlatformClient> = Arc::new(MockPlatformClient::new());
    let bridge = ExternalBridge::new(config, supervisor.clone(), correlator, platform);
    bridge.spawn_event_loop();

    tracing::info!("bridge running; press ctrl-c to exit");
    let _ = tokio::signal::ctrl_c().await;
    supervisor.stop_all().await;
}

fn load_config(path: &str) -> BridgeConfig {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("could not read config file {path}: {e}"));
    serde_json::from_str(&raw).unwrap_or_else(|e| panic!("invalid config file {path}: {e}"))
}

/// Wires the supervisor's classified-record broadcast into the Fan-out
/// Engine (spec.md §9: `SupervisorEvent` is "broadcast over a
/// `tokio::sync::broadcast` channel that `bridge_platform` and the fan-out
/// engine both subscribe to" — this is that second subscriber).
fn spawn_fanout_consumer(config: Arc<BridgeConfig>, supervisor: Arc<ConnectionSupervisor>, fanout: Arc<FanoutEngine>) {
    let mut rx = supervisor.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SupervisorEvent::Classified { guild_id, record }) => {
                    if let Some(source) = config.guild(&guild_id) {
                        fanout.handle(&record, source).await;
                    }
                }
                Ok(SupervisorEvent::Lifecycle(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "fan-out consumer lagged behind supervisor broadcast");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    });
}
