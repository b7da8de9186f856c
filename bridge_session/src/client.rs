use async_trait::async_trait;

use bridge_types::{GuildConfig, Result};

/// Mirrors the game-client collaborator's event surface from spec.md §6:
/// `spawn | end(reason) | kicked(reason, loggedIn) | error(err) |
/// message(text) | health(hp)`.
#[derive(Debug, Clone, PartialEq)]
pub enum GameSessionEvent {
    Spawn,
    End { reason: String },
    Kicked { reason: String, logged_in: bool },
    Error { message: String },
    Message { text: String },
    Health { hp: f32 },
}

/// One live connection to a game server. Implementations of this trait are
/// the out-of-scope "game-client collaborator" (spec.md §1); this crate
/// only defines the boundary `bridge_core::connection::GuildConnection`
/// (component D) programs against.
#[async_trait]
pub trait GameSession: Send + Sync {
    async fn chat(&self, text: &str) -> Result<()>;
    async fn quit(&self) -> Result<()>;

    /// Awaits the next inbound event. `None` once the session is closed and
    /// no further events will arrive.
    async fn recv(&mut self) -> Option<GameSessionEvent>;
}

/// Spawns [`GameSession`]s for a guild's account. Analogous to the
/// `connect(config) -> handle` contract in spec.md §6.
#[async_trait]
pub trait GameClient: Send + Sync {
    async fn connect(&self, config: &GuildConfig) -> Result<Box<dyn GameSession>>;
}
