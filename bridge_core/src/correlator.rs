use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use bridge_types::{ClassifiedRecord, CommandKind, CorrelatorResult, GuildId, ListenerId, PendingCommand};

mod matcher;

/// Matches outgoing slash commands against the classified records that
/// later confirm or reject them (spec.md §4.F). One correlator instance is
/// shared across all guilds; pending commands are tracked per `guild_id`.
pub struct CommandCorrelator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<GuildId, Vec<PendingCommand>>>,
}

impl CommandCorrelator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Registers a pending command and schedules its deadline. Returns the
    /// `listener_id` (for `cancel_listener`) and the one-shot receiver
    /// `waitForResult` awaits.
    pub fn create_listener(
        self: &Arc<Self>,
        guild_id: impl Into<GuildId>,
        kind: CommandKind,
        target: Option<String>,
        command: impl Into<String>,
        timeout: Duration,
    ) -> (ListenerId, oneshot::Receiver<CorrelatorResult>) {
        let guild_id = guild_id.into();
        let listener_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let pending_cmd = PendingCommand {
            listener_id,
            guild_id: guild_id.clone(),
            kind,
            target,
            command: command.into(),
            deadline_at: std::time::Instant::now() + timeout,
            reply: Some(tx),
        };
        self.pending
            .lock()
            .unwrap()
            .entry(guild_id.clone())
            .or_default()
            .push(pending_cmd);

        let correlator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            correlator.expire(&guild_id, listener_id);
        });

        (listener_id, rx)
    }

    /// `waitForResult` (spec.md §4.F): awaits the listener's one reply,
    /// resolving to `cancelled` if the actor holding the sender is dropped
    /// without ever replying.
    pub async fn wait_for_result(rx: oneshot::Receiver<CorrelatorResult>) -> CorrelatorResult {
        rx.await.unwrap_or_else(|_| CorrelatorResult::cancelled())
    }

    pub fn cancel_listener(&self, guild_id: &str, listener_id: ListenerId) {
        self.resolve(guild_id, listener_id, CorrelatorResult::cancelled());
    }

    fn expire(&self, guild_id: &str, listener_id: ListenerId) {
        self.resolve(guild_id, listener_id, CorrelatorResult::timeout());
    }

    fn resolve(&self, guild_id: &str, listener_id: ListenerId, result: CorrelatorResult) {
        let mut pending = self.pending.lock().unwrap();
        let Some(list) = pending.get_mut(guild_id) else {
            return;
        };
        if let Some(pos) = list.iter().position(|c| c.listener_id == listener_id) {
            let mut cmd = list.remove(pos);
            if let Some(tx) = cmd.reply.take() {
                let _ = tx.send(result);
            }
        }
    }

    /// Called by the supervisor's event consumer for every classified
    /// `Event`/`System` record. FIFO-per-`{guild_id, kind, target}`: the
    /// oldest pending command sharing a matching key wins (spec.md §4.F,
    /// identity resolved in SPEC_FULL.md §9).
    pub fn handle_record(&self, guild_id: &str, record: &ClassifiedRecord) {
        let mut pending = self.pending.lock().unwrap();
        let Some(list) = pending.get_mut(guild_id) else {
            return;
        };
        let Some(pos) = list
            .iter()
            .position(|cmd| matcher::resolves(cmd.kind, cmd.target.as_deref(), record))
        else {
            return;
        };
        let mut cmd = list.remove(pos);
        if let Some(tx) = cmd.reply.take() {
            let _ = tx.send(matcher::build_result(record));
        }
    }

    /// Sweeps every guild's pending list for commands past their deadline.
    /// A backstop for the per-listener timeout task; not required for
    /// correctness but keeps `pending` from growing if a deadline task is
    /// ever starved.
    pub fn sweep_expired(&self) {
        let now = std::time::Instant::now();
        let mut pending = self.pending.lock().unwrap();
        for list in pending.values_mut() {
            list.retain_mut(|cmd| {
                if cmd.is_expired(now) {
                    if let Some(tx) = cmd.reply.take() {
                        let _ = tx.send(CorrelatorResult::timeout());
                    }
                    false
                } else {
                    true
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_types::EventRecord;

    #[tokio::test]
    async fn invite_resolves_on_matching_event() {
        let correlator = CommandCorrelator::new();
        let (_id, rx) = correlator.create_listener(
            "guildA",
            CommandKind::Invite,
            Some("Steve".into()),
            "/g invite Steve",
            Duration::from_secs(5),
        );

        correlator.handle_record(
            "guildA",
            &ClassifiedRecord::Event(EventRecord {
                guild_id: "guildA".into(),
                kind: Some(bridge_types::EventKind::Invite),
                actor: Some("Bot".into()),
                target: Some("Steve".into()),
                raw: "Bot invited Steve to the guild!".into(),
                ..Default::default()
            }),
        );

        let result = CommandCorrelator::wait_for_result(rx).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn unrelated_record_does_not_resolve_listener() {
        let correlator = CommandCorrelator::new();
        let (_id, rx) = correlator.create_listener(
            "guildA",
            CommandKind::Invite,
            Some("Steve".into()),
            "/g invite Steve",
            Duration::from_millis(50),
        );

        correlator.handle_record(
            "guildA",
            &ClassifiedRecord::Event(EventRecord {
                guild_id: "guildA".into(),
                kind: Some(bridge_types::EventKind::Join),
                actor: Some("Someone".into()),
                raw: "Someone joined the guild!".into(),
                ..Default::default()
            }),
        );

        let result = CommandCorrelator::wait_for_result(rx).await;
        assert_eq!(result.result_type, bridge_types::ResultType::Timeout);
    }

    #[tokio::test]
    async fn cancel_listener_resolves_as_cancelled() {
        let correlator = CommandCorrelator::new();
        let (id, rx) = correlator.create_listener(
            "guildA",
            CommandKind::Kick,
            Some("Steve".into()),
            "/g kick Steve",
            Duration::from_secs(5),
        );
        correlator.cancel_listener("guildA", id);
        let result = CommandCorrelator::wait_for_result(rx).await;
        assert_eq!(result.result_type, bridge_types::ResultType::Cancelled);
    }

    #[tokio::test]
    async fn two_pending_commands_with_same_key_resolve_fifo() {
        let correlator = CommandCorrelator::new();
        let (_first_id, first_rx) = correlator.create_listener(
            "guildA",
            CommandKind::Mute,
            Some("Steve".into()),
            "/g mute Steve 10m",
            Duration::from_secs(5),
        );
        let (_second_id, second_rx) = correlator.create_listener(
            "guildA",
            CommandKind::Mute,
            Some("Steve".into()),
            "/g mute Steve 10m",
            Duration::from_secs(5),
        );

        correlator.handle_record(
            "guildA",
            &ClassifiedRecord::System(bridge_types::SystemRecord {
                guild_id: "guildA".into(),
                system_kind: "mute_result".into(),
                payload: Some("Steve has been muted for 10m".into()),
                raw: "Steve has been muted for 10m".into(),
            }),
        );

        let first = CommandCorrelator::wait_for_result(first_rx).await;
        assert!(first.success);

        correlator.handle_record(
            "guildA",
            &ClassifiedRecord::System(bridge_types::SystemRecord {
                guild_id: "guildA".into(),
                system_kind: "mute_result".into(),
                payload: Some("Steve has been muted for 10m".into()),
                raw: "Steve has been muted for 10m".into(),
            }),
        );
        let second = CommandCorrelator::wait_for_result(second_rx).await;
        assert!(second.success);
    }
}
