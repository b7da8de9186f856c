use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use bridge_session::GameSession;
use bridge_types::GuildConfig;

use crate::pattern::{PatternCatalog, PatternGroup};

/// Outcome of `C.filterInbound` (spec.md §4.C): the first-gate decision that
/// runs before the Classifier is invoked at all.
pub struct FilterResult {
    pub pass: bool,
    pub pass_data: Option<String>,
}

impl FilterResult {
    fn reject() -> Self {
        Self {
            pass: false,
            pass_data: None,
        }
    }

    fn accept(text: impl Into<String>) -> Self {
        Self {
            pass: true,
            pass_data: Some(text.into()),
        }
    }
}

/// Per-flavor behavior for connection bring-up and inbound first-gating
/// (spec.md §4.C). Implementations are looked up by `GuildConfig.server.flavor`
/// through [`StrategyRegistry`].
#[async_trait]
pub trait ServerStrategy: Send + Sync {
    /// Runs a flavor-specific post-connect script. Bounded to 3 attempts per
    /// step with fixed inter-step waits; failure does not invalidate the
    /// connection — the strategy logs and returns regardless of outcome.
    async fn on_connect(&self, session: &dyn GameSession, guild: &GuildConfig);

    /// Same contract as `on_connect`, run after a successful reconnect.
    async fn on_reconnect(&self, session: &dyn GameSession, guild: &GuildConfig) {
        self.on_connect(session, guild).await;
    }

    /// Cheap first-gate: messages that don't pass are never handed to the
    /// Classifier at all.
    fn filter_inbound(&self, raw: &str, guild: &GuildConfig) -> FilterResult;
}

const STEP_RETRIES: u32 = 3;
const STEP_WAIT: Duration = Duration::from_millis(250);

/// The single strategy variant carried into this workspace (spec.md §9:
/// "the more capable variant ... is the one and only `DefaultStrategy`
/// implemented here").
pub struct DefaultStrategy {
    post_connect_script: Vec<String>,
    catalog: std::sync::Arc<PatternCatalog>,
}

impl DefaultStrategy {
    pub fn new(catalog: std::sync::Arc<PatternCatalog>, post_connect_script: Vec<String>) -> Self {
        Self {
            post_connect_script,
            catalog,
        }
    }

    async fn run_step(&self, session: &dyn GameSession, step: &str) {
        for attempt in 1..=STEP_RETRIES {
            match session.chat(step).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(step, attempt, error = %e, "post-connect script step failed");
                    if attempt < STEP_RETRIES {
                        tokio::time::sleep(STEP_WAIT).await;
                    }
                }
            }
        }
        tracing::warn!(step, "post-connect script step exhausted retries, continuing");
    }
}

#[async_trait]
impl ServerStrategy for DefaultStrategy {
    async fn on_connect(&self, session: &dyn GameSession, guild: &GuildConfig) {
        for step in &self.post_connect_script {
            self.run_step(session, step).await;
            tokio::time::sleep(STEP_WAIT).await;
        }
        tracing::debug!(guild_id = %guild.id, "post-connect script finished");
    }

    fn filter_inbound(&self, raw: &str, guild: &GuildConfig) -> FilterResult {
        let flavor = guild.server.flavor.as_str();
        let relevant = self.catalog.with_group(flavor, PatternGroup::GuildChat, |p| {
            p.iter().any(|p| p.regex.is_match(raw))
        }) || self.catalog.with_group(flavor, PatternGroup::OfficerChat, |p| {
            p.iter().any(|p| p.regex.is_match(raw))
        }) || self.catalog.with_group(flavor, PatternGroup::Event, |p| {
            p.iter().any(|p| p.regex.is_match(raw))
        }) || self.catalog.with_group(flavor, PatternGroup::System, |p| {
            p.iter().any(|p| p.regex.is_match(raw))
        });

        if relevant {
            FilterResult::accept(raw)
        } else {
            FilterResult::reject()
        }
    }
}

/// Looks up a [`ServerStrategy`] by `GuildConfig.server.flavor`, falling
/// back to a plain `DefaultStrategy` with an empty post-connect script for
/// unregistered flavors.
pub struct StrategyRegistry {
    strategies: HashMap<String, std::sync::Arc<dyn ServerStrategy>>,
    catalog: std::sync::Arc<PatternCatalog>,
}

impl StrategyRegistry {
    pub fn new(catalog: std::sync::Arc<PatternCatalog>) -> Self {
        Self {
            strategies: HashMap::new(),
            catalog,
        }
    }

    pub fn register(&mut self, flavor: impl Into<String>, strategy: std::sync::Arc<dyn ServerStrategy>) {
        self.strategies.insert(flavor.into(), strategy);
    }

    pub fn for_flavor(&self, flavor: &str) -> std::sync::Arc<dyn ServerStrategy> {
        self.strategies.get(flavor).cloned().unwrap_or_else(|| {
            std::sync::Arc::new(DefaultStrategy::new(self.catalog.clone(), Vec::new()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_session::GameSessionEvent;
    use bridge_types::Result as SessionResult;
    use std::sync::{Arc, Mutex};

    struct RecordingSession {
        calls: Arc<Mutex<Vec<String>>>,
        fail_first_n: Mutex<u32>,
    }

    #[async_trait]
    impl GameSession for RecordingSession {
        async fn chat(&self, text: &str) -> SessionResult<()> {
            self.calls.lock().unwrap().push(text.to_string());
            let mut remaining = self.fail_first_n.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(bridge_types::BridgeError::Network("boom".into()));
            }
            Ok(())
        }

        async fn quit(&self) -> SessionResult<()> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<GameSessionEvent> {
            None
        }
    }

    fn guild() -> GuildConfig {
        bridge_types::GuildConfig {
            id: "g".into(),
            name: "G".into(),
            tag: "G".into(),
            enabled: true,
            account: bridge_types::AccountConfig {
                username: "Bot".into(),
                auth_method: bridge_types::AuthMethod::Offline,
                session_path: "s".into(),
                cache_path: "c".into(),
                profiles_folder: "p".into(),
                chat_length_limit: 256,
                reconnection: bridge_types::ReconnectionPolicy::default(),
            },
            server: bridge_types::ServerConfig {
                flavor: "classic".into(),
                host: "h".into(),
                port: 1,
                version: "1".into(),
            },
            ranks: vec![],
            commands: bridge_types::CommandsConfig::default(),
        }
    }

    #[tokio::test]
    async fn post_connect_script_runs_every_step_even_after_failures() {
        let catalog = Arc::new(PatternCatalog::with_defaults().unwrap());
        let strategy = DefaultStrategy::new(catalog, vec!["/language en".into(), "/who".into()]);
        let session = RecordingSession {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_first_n: Mutex::new(2),
        };

        strategy.on_connect(&session, &guild()).await;

        let calls = session.calls.lock().unwrap();
        assert!(calls.iter().any(|c| c == "/language en"));
        assert!(calls.iter().any(|c| c == "/who"));
    }

    #[test]
    fn filter_inbound_rejects_noise_and_accepts_guild_chat() {
        let catalog = Arc::new(PatternCatalog::with_defaults().unwrap());
        let strategy = DefaultStrategy::new(catalog, vec![]);

        let accepted = strategy.filter_inbound("Guild > Alice: hi", &guild());
        assert!(accepted.pass);

        let rejected = strategy.filter_inbound("random unrelated server spam", &guild());
        assert!(!rejected.pass);
    }
}
