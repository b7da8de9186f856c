use std::sync::{Arc, Mutex};

use async_trait::async_trait;

/// What kind of notification a [`Card`] represents — lets a real platform
/// adapter choose colors/icons without this crate knowing anything about
/// embeds (spec.md §1: "embed-style presentation" is an out-of-scope
/// collaborator concern).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Success,
    Failure,
    Timeout,
    Rejected,
    Unexpected,
    ConnectionStatus,
    GuildChat,
    OfficerChat,
    Event,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub kind: CardKind,
    pub title: String,
    pub body: String,
}

impl Card {
    pub fn new(kind: CardKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// The external-chat-platform collaborator (spec.md §6): `onSlashCommand`,
/// `replyDeferred`, `editReply`, plus a plain notification channel for the
/// records `I` relays without being asked (guild chat, events, connection
/// status). No concrete implementation ships here — that client library is
/// out of scope (spec.md §1).
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn reply_deferred(&self, channel_id: &str);
    async fn edit_reply(&self, channel_id: &str, card: Card);
    async fn post_notification(&self, card: Card);
}

/// In-memory [`PlatformClient`] for tests and `bridge_cli`'s demo wiring,
/// grounded the same way `bridge_session::MockGameClient` is.
#[derive(Default, Clone)]
pub struct MockPlatformClient {
    deferred: Arc<Mutex<Vec<String>>>,
    replies: Arc<Mutex<Vec<(String, Card)>>>,
    notifications: Arc<Mutex<Vec<Card>>>,
}

impl MockPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> Vec<(String, Card)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Card> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformClient for MockPlatformClient {
    async fn reply_deferred(&self, channel_id: &str) {
        self.deferred.lock().unwrap().push(channel_id.to_string());
    }

    async fn edit_reply(&self, channel_id: &str, card: Card) {
        self.replies.lock().unwrap().push((channel_id.to_string(), card));
    }

    async fn post_notification(&self, card: Card) {
        self.notifications.lock().unwrap().push(card);
    }
}
