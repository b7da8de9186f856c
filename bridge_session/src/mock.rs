use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use bridge_types::{GuildConfig, Result};

use crate::client::{GameClient, GameSession, GameSessionEvent};

/// In-memory [`GameClient`] used by tests and `bridge_cli`'s demo wiring.
///
/// Grounded in the teacher's own test fixture (`rucord_ws/tests/test.rs`'s
/// `RawEventHandler`): a minimal stand-in for the out-of-scope external
/// collaborator, just enough to drive the rest of the system deterministically.
#[derive(Default, Clone)]
pub struct MockGameClient {
    handles: Arc<Mutex<HashMap<String, MockHandle>>>,
}

impl MockGameClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the handle for a guild that has already connected, so test
    /// code can push inbound lines or inspect what was sent.
    pub fn handle_for(&self, guild_id: &str) -> Option<MockHandle> {
        self.handles.lock().unwrap().get(guild_id).cloned()
    }
}

#[async_trait]
impl GameClient for MockGameClient {
    async fn connect(&self, config: &GuildConfig) -> Result<Box<dyn GameSession>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));

        let handle = MockHandle {
            sent: sent.clone(),
            inbound: tx,
        };
        self.handles
            .lock()
            .unwrap()
            .insert(config.id.clone(), handle);

        Ok(Box::new(MockSession { sent, inbound: rx }))
    }
}

#[derive(Clone)]
pub struct MockHandle {
    sent: Arc<Mutex<Vec<String>>>,
    inbound: mpsc::UnboundedSender<GameSessionEvent>,
}

impl MockHandle {
    pub fn push_raw_message(&self, text: impl Into<String>) {
        let _ = self.inbound.send(GameSessionEvent::Message { text: text.into() });
    }

    pub fn push_event(&self, event: GameSessionEvent) {
        let _ = self.inbound.send(event);
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

struct MockSession {
    sent: Arc<Mutex<Vec<String>>>,
    inbound: mpsc::UnboundedReceiver<GameSessionEvent>,
}

#[async_trait]
impl GameSession for MockSession {
    async fn chat(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        Ok(())
    }

    async fn recv(&mut self) -> Option<GameSessionEvent> {
        self.inbound.recv().await
    }
}
