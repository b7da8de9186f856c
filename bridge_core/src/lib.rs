//! Guild-connection lifecycle, classification, and inter-guild fan-out.
//!
//! Mirrors the teacher's shard/gateway split: [`pattern`] + [`classifier`]
//! decode raw lines, [`connection`] + [`supervisor`] own the per-guild
//! session lifecycle, [`correlator`] matches commands to their outcomes,
//! and [`fanout`] + [`queue`] move classified records between guilds.

pub mod classifier;
pub mod connection;
pub mod correlator;
pub mod fanout;
pub mod pattern;
pub mod queue;
pub mod strategy;
pub mod supervisor;
pub mod util;

pub use classifier::classify;
pub use connection::{ConnectionEvent, GuildConnectionHandle};
pub use correlator::CommandCorrelator;
pub use fanout::FanoutEngine;
pub use pattern::{CompiledPattern, PatternCatalog, PatternDefinition, PatternGroup};
pub use queue::DeliveryQueue;
pub use strategy::{DefaultStrategy, FilterResult, ServerStrategy, StrategyRegistry};
pub use supervisor::{ConnectionLifecycle, ConnectionSupervisor, SupervisorEvent};
