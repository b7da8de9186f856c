use std::sync::{Arc, Mutex};
use std::time::Duration;

use kanal::{AsyncReceiver, AsyncSender};
use rand::Rng;
use tokio::sync::oneshot;

use bridge_session::{GameClient, GameSession, GameSessionEvent};
use bridge_types::{
    ChatSubtype, ClassifiedRecord, ConnectionState, ConnectionStatus, GuildConfig, GuildId, Result,
};

use crate::classifier::classify;
use crate::pattern::PatternCatalog;
use crate::strategy::ServerStrategy;
use crate::util::truncate_for_chat;

/// Lifecycle and classified-traffic events the connection actor reports
/// upward to the Connection Supervisor (spec.md §4.D/§4.E: "fans connection
/// lifecycle, classified chat, and classified events upward as typed
/// events"). Grounded on the teacher's `WebSocketShard`/`WorkerMessage`
/// split, generalized to one typed event enum instead of a per-kind channel.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected { guild_id: GuildId },
    Disconnected { guild_id: GuildId, reason: String },
    Kicked { guild_id: GuildId, reason: String, logged_in: bool },
    Error { guild_id: GuildId, message: String },
    Failed { guild_id: GuildId },
    Classified { guild_id: GuildId, record: ClassifiedRecord },
}

enum ConnectionCommand {
    Connect(oneshot::Sender<Result<()>>),
    Reconnect(oneshot::Sender<Result<()>>),
    SendMessage {
        text: String,
        subtype: ChatSubtype,
        reply: oneshot::Sender<Result<()>>,
    },
    ExecuteCommand {
        command: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        silent: bool,
        reply: oneshot::Sender<()>,
    },
}

const MAX_ATTEMPTS_PER_RUN: u32 = 5;
const SPAWN_WAIT: Duration = Duration::from_secs(60);
const SESSION_POLL_TIMEOUT: Duration = Duration::from_millis(500);
const GUILD_CHAT_PREFIX: &str = "/gc ";
const OFFICER_CHAT_PREFIX: &str = "/oc ";

/// Cheaply-clonable front for one guild's connection. All state mutation
/// happens on the owning actor task; this handle only sends commands and
/// reads the shared, lock-protected [`ConnectionStatus`] snapshot.
#[derive(Clone)]
pub struct GuildConnectionHandle {
    pub guild_id: GuildId,
    cmd_tx: AsyncSender<ConnectionCommand>,
    status: Arc<Mutex<ConnectionStatus>>,
}

impl GuildConnectionHandle {
    pub fn is_connected(&self) -> bool {
        self.status.lock().unwrap().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.lock().unwrap().state
    }

    pub async fn connect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ConnectionCommand::Connect(tx)).await?;
        await_reply(rx).await
    }

    pub async fn reconnect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ConnectionCommand::Reconnect(tx)).await?;
        await_reply(rx).await
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.send(text, ChatSubtype::Guild).await
    }

    pub async fn send_officer_message(&self, text: &str) -> Result<()> {
        self.send(text, ChatSubtype::Officer).await
    }

    async fn send(&self, text: &str, subtype: ChatSubtype) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ConnectionCommand::SendMessage {
            text: text.to_string(),
            subtype,
            reply: tx,
        })
        .await?;
        await_reply(rx).await
    }

    pub async fn execute_command(&self, command: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ConnectionCommand::ExecuteCommand {
            command: command.to_string(),
            reply: tx,
        })
        .await?;
        await_reply(rx).await
    }

    pub async fn disconnect(&self, silent: bool) {
        let (tx, rx) = oneshot::channel();
        if self
            .send_command(ConnectionCommand::Disconnect { silent, reply: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    async fn send_command(&self, cmd: ConnectionCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| bridge_types::BridgeError::Internal("connection actor is gone".into()))
    }
}

async fn await_reply(rx: oneshot::Receiver<Result<()>>) -> Result<()> {
    rx.await
        .unwrap_or_else(|_| Err(bridge_types::BridgeError::Internal("connection actor dropped reply".into())))
}

/// Spawns the actor task that owns the live [`GameSession`] for one guild
/// and returns the handle the Connection Supervisor holds onto.
pub fn spawn(
    config: GuildConfig,
    game_client: Arc<dyn GameClient>,
    strategy: Arc<dyn ServerStrategy>,
    catalog: Arc<PatternCatalog>,
    preserve_color_codes: bool,
    events_tx: AsyncSender<ConnectionEvent>,
) -> GuildConnectionHandle {
    let (cmd_tx, cmd_rx) = kanal::unbounded_async::<ConnectionCommand>();
    let status = Arc::new(Mutex::new(ConnectionStatus::new()));
    let guild_id = config.id.clone();

    let actor = GuildConnectionActor {
        guild_id: guild_id.clone(),
        config,
        game_client,
        strategy,
        catalog,
        preserve_color_codes,
        status: status.clone(),
        session: None,
        cmd_rx,
        events_tx,
    };
    tokio::spawn(actor.run());

    GuildConnectionHandle {
        guild_id,
        cmd_tx,
        status,
    }
}

struct GuildConnectionActor {
    guild_id: GuildId,
    config: GuildConfig,
    game_client: Arc<dyn GameClient>,
    strategy: Arc<dyn ServerStrategy>,
    catalog: Arc<PatternCatalog>,
    preserve_color_codes: bool,
    status: Arc<Mutex<ConnectionStatus>>,
    session: Option<Box<dyn GameSession>>,
    cmd_rx: AsyncReceiver<ConnectionCommand>,
    events_tx: AsyncSender<ConnectionEvent>,
}

impl GuildConnectionActor {
    async fn run(mut self) {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(Some(cmd)) => {
                    self.handle_command(cmd).await;
                    continue;
                }
                Ok(None) => {}
                Err(_) => break,
            }

            if self.session.is_some() {
                let outcome = {
                    let session = self.session.as_mut().unwrap();
                    tokio::time::timeout(SESSION_POLL_TIMEOUT, session.recv()).await
                };
                match outcome {
                    Ok(Some(event)) => self.handle_session_event(event).await,
                    Ok(None) => {
                        self.session = None;
                        self.status.lock().unwrap().transition(ConnectionState::Disconnected);
                        let _ = self
                            .events_tx
                            .send(ConnectionEvent::Disconnected {
                                guild_id: self.guild_id.clone(),
                                reason: "session stream ended".to_string(),
                            })
                            .await;
                    }
                    Err(_) => {}
                }
            } else {
                match self.cmd_rx.recv().await {
                    Ok(cmd) => self.handle_command(cmd).await,
                    Err(_) => break,
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: ConnectionCommand) {
        match cmd {
            ConnectionCommand::Connect(reply) => self.handle_connect(reply).await,
            ConnectionCommand::Reconnect(reply) => self.handle_reconnect(reply).await,
            ConnectionCommand::SendMessage { text, subtype, reply } => {
                self.handle_send_message(text, subtype, reply).await
            }
            ConnectionCommand::ExecuteCommand { command, reply } => {
                self.handle_execute_command(command, reply).await
            }
            ConnectionCommand::Disconnect { silent, reply } => {
                self.do_disconnect(silent).await;
                let _ = reply.send(());
            }
        }
    }

    async fn establish_session(&mut self) -> Result<Box<dyn GameSession>> {
        let mut session = self.game_client.connect(&self.config).await?;
        loop {
            match session.recv().await {
                Some(GameSessionEvent::Spawn) => return Ok(session),
                Some(GameSessionEvent::Error { message }) => {
                    return Err(bridge_types::BridgeError::Network(message))
                }
                Some(_) => continue,
                None => {
                    return Err(bridge_types::BridgeError::Network(
                        "session closed before spawn".into(),
                    ))
                }
            }
        }
    }

    async fn do_connect_internal(&mut self) -> Result<()> {
        self.status.lock().unwrap().transition(ConnectionState::Connecting);
        match tokio::time::timeout(SPAWN_WAIT, self.establish_session()).await {
            Ok(Ok(session)) => {
                self.session = Some(session);
                let mut status = self.status.lock().unwrap();
                status.transition(ConnectionState::Connected);
                status.reset_attempts();
                drop(status);
                let _ = self
                    .events_tx
                    .send(ConnectionEvent::Connected {
                        guild_id: self.guild_id.clone(),
                    })
                    .await;
                Ok(())
            }
            Ok(Err(e)) => {
                self.fail_attempt(&e).await;
                Err(e)
            }
            Err(_) => {
                let e = bridge_types::BridgeError::Timeout;
                self.fail_attempt(&e).await;
                Err(e)
            }
        }
    }

    async fn fail_attempt(&mut self, err: &bridge_types::BridgeError) {
        let attempt = self.status.lock().unwrap().bump_attempt();
        if attempt >= MAX_ATTEMPTS_PER_RUN {
            self.status.lock().unwrap().transition(ConnectionState::Failed);
            let _ = self
                .events_tx
                .send(ConnectionEvent::Failed {
                    guild_id: self.guild_id.clone(),
                })
                .await;
        } else {
            self.status.lock().unwrap().transition(ConnectionState::Disconnected);
            let _ = self
                .events_tx
                .send(ConnectionEvent::Error {
                    guild_id: self.guild_id.clone(),
                    message: err.to_string(),
                })
                .await;
        }
    }

    async fn handle_connect(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.session.is_some() {
            let _ = reply.send(Err(bridge_types::BridgeError::Internal(
                "already connected".into(),
            )));
            return;
        }
        let result = self.do_connect_internal().await;
        if result.is_ok() {
            self.strategy
                .on_connect(self.session.as_deref().unwrap(), &self.config)
                .await;
        }
        let _ = reply.send(result);
    }

    async fn handle_reconnect(&mut self, reply: oneshot::Sender<Result<()>>) {
        self.do_disconnect(true).await;

        let attempt = self.status.lock().unwrap().attempt.max(1);
        let delay = calc_delay(self.config.account.reconnection.retry_delay_ms, attempt);
        self.status.lock().unwrap().transition(ConnectionState::Reconnecting);
        tokio::time::sleep(delay).await;

        let result = self.do_connect_internal().await;
        if result.is_ok() {
            self.strategy
                .on_reconnect(self.session.as_deref().unwrap(), &self.config)
                .await;
        }
        let _ = reply.send(result);
    }

    async fn do_disconnect(&mut self, silent: bool) {
        if let Some(session) = self.session.take() {
            let _ = session.quit().await;
        }
        self.status.lock().unwrap().transition(ConnectionState::Disconnected);
        if !silent {
            let _ = self
                .events_tx
                .send(ConnectionEvent::Disconnected {
                    guild_id: self.guild_id.clone(),
                    reason: "manual disconnect".to_string(),
                })
                .await;
        }
    }

    async fn handle_send_message(
        &mut self,
        text: String,
        subtype: ChatSubtype,
        reply: oneshot::Sender<Result<()>>,
    ) {
        let Some(session) = self.session.as_ref() else {
            let _ = reply.send(Err(bridge_types::BridgeError::Network("not connected".into())));
            return;
        };
        let body = truncate_for_chat(&text, self.config.account.chat_length_limit);
        let prefix = match subtype {
            ChatSubtype::Guild => GUILD_CHAT_PREFIX,
            ChatSubtype::Officer => OFFICER_CHAT_PREFIX,
        };
        let result = session.chat(&format!("{prefix}{body}")).await;
        let _ = reply.send(result);
    }

    async fn handle_execute_command(&mut self, command: String, reply: oneshot::Sender<Result<()>>) {
        let first_token = command.split_whitespace().next().unwrap_or("");
        if !self.config.allows_command(first_token) {
            let _ = reply.send(Err(bridge_types::BridgeError::CommandRejected(format!(
                "`{first_token}` is not in this guild's allowed command list"
            ))));
            return;
        }
        let Some(session) = self.session.as_ref() else {
            let _ = reply.send(Err(bridge_types::BridgeError::Network("not connected".into())));
            return;
        };
        let result = session.chat(&command).await;
        let _ = reply.send(result);
    }

    async fn handle_session_event(&mut self, event: GameSessionEvent) {
        match event {
            GameSessionEvent::Spawn => {}
            GameSessionEvent::End { reason } => {
                self.session = None;
                self.status.lock().unwrap().transition(ConnectionState::Disconnected);
                let _ = self
                    .events_tx
                    .send(ConnectionEvent::Disconnected {
                        guild_id: self.guild_id.clone(),
                        reason,
                    })
                    .await;
            }
            GameSessionEvent::Kicked { reason, logged_in } => {
                self.session = None;
                self.status.lock().unwrap().transition(ConnectionState::Disconnected);
                let _ = self
                    .events_tx
                    .send(ConnectionEvent::Kicked {
                        guild_id: self.guild_id.clone(),
                        reason,
                        logged_in,
                    })
                    .await;
            }
            GameSessionEvent::Error { message } => {
                let _ = self
                    .events_tx
                    .send(ConnectionEvent::Error {
                        guild_id: self.guild_id.clone(),
                        message,
                    })
                    .await;
            }
            GameSessionEvent::Health { .. } => {}
            GameSessionEvent::Message { text } => {
                let filter = self.strategy.filter_inbound(&text, &self.config);
                if !filter.pass {
                    return;
                }
                let raw = filter.pass_data.unwrap_or(text);
                let record = classify(&raw, &self.config, &self.catalog, self.preserve_color_codes);
                let _ = self
                    .events_tx
                    .send(ConnectionEvent::Classified {
                        guild_id: self.guild_id.clone(),
                        record,
                    })
                    .await;
            }
        }
    }
}

/// `baseDelay * min(attempt, 5) + rand[0, 5s)` (spec.md §4.D `calcDelay`).
fn calc_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let bounded_attempt = attempt.min(5) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..5_000);
    Duration::from_millis(base_delay_ms * bounded_attempt + jitter_ms)
}
