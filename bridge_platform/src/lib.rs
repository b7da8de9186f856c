//! Adapts the bridge core to an external chat platform: slash-command
//! dispatch, argument validation, and card rendering for both directions.

pub mod bridge;
pub mod client;
pub mod commands;
pub mod render;

pub use bridge::ExternalBridge;
pub use client::{Card, CardKind, MockPlatformClient, PlatformClient};
pub use commands::{DispatchOutcome, MuteScope, SlashCommand};
