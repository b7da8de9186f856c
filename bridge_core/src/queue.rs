use std::sync::Arc;
use std::time::{Duration, Instant};

use kanal::{AsyncReceiver, AsyncSender};

use bridge_types::{QueueItem, QueueKind, Stats};

use crate::supervisor::ConnectionSupervisor;

const MIN_SEND_GAP: Duration = Duration::from_secs(1);
const NOT_CONNECTED_BACKOFF: Duration = Duration::from_secs(5);
const DISPATCH_FAILURE_BACKOFF_UNIT: Duration = Duration::from_secs(2);

/// `H` (spec.md §4.H): single-worker FIFO with a minimum inter-send gap and
/// bounded retry/backoff. Grounded on `rucord_ws::identify_queue::IdentifyQueue`
/// (a single async gate with a reset window), generalized into a retrying
/// worker over an unbounded `kanal` channel.
pub struct DeliveryQueue {
    tx: AsyncSender<QueueItem>,
}

impl DeliveryQueue {
    pub fn spawn(supervisor: Arc<ConnectionSupervisor>, stats: Arc<Stats>) -> Arc<Self> {
        let (tx, rx) = kanal::unbounded_async::<QueueItem>();
        let queue = Arc::new(Self { tx: tx.clone() });
        tokio::spawn(worker_loop(rx, supervisor, stats, tx));
        queue
    }

    /// Enqueues a rendered item for delivery. For a fixed target guild with
    /// no retries, items are delivered in enqueue order (spec.md §8
    /// "Queue ordering" property).
    pub async fn enqueue(&self, item: QueueItem) {
        let _ = self.tx.send(item).await;
    }
}

async fn worker_loop(
    rx: AsyncReceiver<QueueItem>,
    supervisor: Arc<ConnectionSupervisor>,
    stats: Arc<Stats>,
    requeue_tx: AsyncSender<QueueItem>,
) {
    let mut last_send = Instant::now() - MIN_SEND_GAP;
    while let Ok(item) = rx.recv().await {
        let elapsed = last_send.elapsed();
        if elapsed < MIN_SEND_GAP {
            tokio::time::sleep(MIN_SEND_GAP - elapsed).await;
        }
        process_item(item, &supervisor, &stats, &requeue_tx).await;
        last_send = Instant::now();
    }
}

async fn process_item(
    item: QueueItem,
    supervisor: &Arc<ConnectionSupervisor>,
    stats: &Arc<Stats>,
    requeue_tx: &AsyncSender<QueueItem>,
) {
    if item.source_guild_id == item.target_guild_id {
        stats.record_message_dropped();
        return;
    }

    if !supervisor.is_connected(&item.target_guild_id) {
        if item.attempts_exhausted() {
            tracing::debug!(target = %item.target_guild_id, "dropping item: target never came online");
            stats.record_message_dropped();
            return;
        }
        requeue_after(requeue_tx.clone(), item.retried(), NOT_CONNECTED_BACKOFF);
        return;
    }

    let result = match item.kind {
        QueueKind::Officer => supervisor.send_officer_message(&item.target_guild_id, &item.rendered_text).await,
        QueueKind::Guild | QueueKind::Event => {
            supervisor.send_message(&item.target_guild_id, &item.rendered_text).await
        }
    };

    match result {
        Ok(()) => stats.record_message_delivered(),
        Err(e) => {
            if item.attempts_exhausted() {
                tracing::warn!(target = %item.target_guild_id, error = %e, "dropping item: dispatch retries exhausted");
                stats.record_message_dropped();
            } else {
                let retried = item.retried();
                let backoff = DISPATCH_FAILURE_BACKOFF_UNIT * retried.attempts;
                requeue_after(requeue_tx.clone(), retried, backoff);
            }
        }
    }
}

fn requeue_after(tx: AsyncSender<QueueItem>, item: QueueItem, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(item).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternCatalog;
    use crate::strategy::StrategyRegistry;
    use bridge_session::MockGameClient;
    use bridge_types::{AccountConfig, AuthMethod, BridgeConfig, CommandsConfig, GuildConfig, ReconnectionPolicy, ServerConfig};

    fn sample_config() -> BridgeConfig {
        BridgeConfig {
            guilds: vec![
                GuildConfig {
                    id: "source".into(),
                    name: "Source".into(),
                    tag: "SRC".into(),
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
                    ranks: vec![],
                    commands: CommandsConfig::default(),
                },
                GuildConfig {
                    id: "target".into(),
                    name: "Target".into(),
                    tag: "TGT".into(),
                    enabled: true,
                    account: AccountConfig {
                        username: "Bot2".into(),
                        auth_method: AuthMethod::Offline,
                        session_path: "s2".into(),
                        cache_path: "c2".into(),
                        profiles_folder: "p2".into(),
                        chat_length_limit: 256,
                        reconnection: ReconnectionPolicy::default(),
                    },
                    server: ServerConfig {
                        flavor: "classic".into(),
                        host: "h".into(),
                        port: 2,
                        version: "1".into(),
                    },
                    ranks: vec![],
                    commands: CommandsConfig::default(),
                },
            ],
            features: Default::default(),
            advanced: Default::default(),
            bridge: bridge_types::BridgeSettings::default(),
        }
    }

    #[tokio::test]
    async fn delivers_in_order_for_a_connected_target() {
        let client = Arc::new(MockGameClient::new());
        let catalog = Arc::new(PatternCatalog::with_defaults().unwrap());
        let registry = Arc::new(StrategyRegistry::new(catalog.clone()));
        let supervisor = ConnectionSupervisor::new(sample_config(), client.clone(), registry, catalog);

        let start_fut = supervisor.start_all();
        tokio::time::sleep(Duration::from_millis(20)).await;
        for guild_id in ["source", "target"] {
            if let Some(handle) = client.handle_for(guild_id) {
                handle.push_event(bridge_session::GameSessionEvent::Spawn);
            }
        }
        start_fut.await.unwrap();

        let stats = Arc::new(Stats::default());
        let queue = DeliveryQueue::spawn(supervisor.clone(), stats.clone());

        queue
            .enqueue(QueueItem::new(QueueKind::Guild, "target", "source", "first", 3))
            .await;
        queue
            .enqueue(QueueItem::new(QueueKind::Guild, "target", "source", "second", 3))
            .await;

        // The worker enforces a 1s minimum gap between sends, so the second
        // item isn't dispatched until roughly a second after the first.
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let sent = client.handle_for("target").unwrap().sent_messages();
        assert_eq!(sent, vec!["/gc first".to_string(), "/gc second".to_string()]);
        assert_eq!(stats.snapshot().messages_delivered, 2);
    }

    #[tokio::test]
    async fn drops_items_targeting_their_own_source() {
        let client = Arc::new(MockGameClient::new());
        let catalog = Arc::new(PatternCatalog::with_defaults().unwrap());
        let registry = Arc::new(StrategyRegistry::new(catalog.clone()));
        let supervisor = ConnectionSupervisor::new(sample_config(), client, registry, catalog);
        let stats = Arc::new(Stats::default());
        let queue = DeliveryQueue::spawn(supervisor, stats.clone());

        queue
            .enqueue(QueueItem::new(QueueKind::Guild, "source", "source", "loop", 3))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(stats.snapshot().messages_dropped, 1);
    }
}
