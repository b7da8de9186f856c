pub mod command;
pub mod config;
pub mod dedup;
pub mod error;
pub mod queue;
pub mod record;
pub mod state;
pub mod stats;

pub use command::{CommandKind, CorrelatorResult, ListenerId, PendingCommand, ResultType};
pub use config::{
    AccountConfig, AdvancedConfig, AuthMethod, BridgeConfig, BridgeSettings, ChatParserConfig,
    CommandsConfig, FeaturesConfig, GuildConfig, GuildId, InterGuildConfig,
    MessageCleanerConfig, RateLimitConfig, RateLimitSettings, ReconnectionPolicy, ServerConfig,
};
pub use dedup::{MessageHash, PerGuildHistory, RateLimitWindow};
pub use error::{BridgeError, Result};
pub use queue::{QueueItem, QueueKind};
pub use record::{ChatRecord, ChatSubtype, ClassifiedRecord, EventKind, EventRecord, SystemRecord};
pub use state::{ConnectionState, ConnectionStatus};
pub use stats::{Stats, StatsSnapshot};
