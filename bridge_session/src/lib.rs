pub mod auth;
pub mod client;
pub mod mock;

pub use auth::{AuthSessionStore, SessionArtifact, SessionPaths};
pub use client::{GameClient, GameSession, GameSessionEvent};
pub use mock::{MockGameClient, MockHandle};
