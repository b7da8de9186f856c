use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;

use bridge_types::{BridgeError, Result};

/// The five pattern groups a flavor's lines are matched against, in the
/// fixed precedence order the Classifier walks (spec.md §4.A/§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternGroup {
    Ignore,
    GuildChat,
    OfficerChat,
    Event,
    System,
}

pub struct CompiledPattern {
    pub kind: String,
    pub regex: Regex,
}

#[derive(Default)]
struct FlavorPatterns {
    ignore: Vec<CompiledPattern>,
    guild_chat: Vec<CompiledPattern>,
    officer_chat: Vec<CompiledPattern>,
    events: Vec<CompiledPattern>,
    system: Vec<CompiledPattern>,
}

impl FlavorPatterns {
    fn group(&self, group: PatternGroup) -> &[CompiledPattern] {
        match group {
            PatternGroup::Ignore => &self.ignore,
            PatternGroup::GuildChat => &self.guild_chat,
            PatternGroup::OfficerChat => &self.officer_chat,
            PatternGroup::Event => &self.events,
            PatternGroup::System => &self.system,
        }
    }

    fn group_mut(&mut self, group: PatternGroup) -> &mut Vec<CompiledPattern> {
        match group {
            PatternGroup::Ignore => &mut self.ignore,
            PatternGroup::GuildChat => &mut self.guild_chat,
            PatternGroup::OfficerChat => &mut self.officer_chat,
            PatternGroup::Event => &mut self.events,
            PatternGroup::System => &mut self.system,
        }
    }
}

/// One named, declarative line pattern to register (spec.md §4.A:
/// "registerPattern(flavor, group, kind, pattern)").
pub struct PatternDefinition {
    pub group: PatternGroup,
    pub kind: &'static str,
    pub pattern: &'static str,
}

/// Per-flavor regex tables keyed by server flavor (`GuildConfig.server.flavor`).
///
/// Registration happens once at startup (`bridge_cli::main` calls
/// [`PatternCatalog::with_defaults`]); after `startAll` nothing else writes
/// to it, matching spec.md §9's "constructed once, passed by `Arc`, not a
/// lazy-static singleton" decision. The `RwLock` exists for the registration
/// window, not for steady-state mutation.
#[derive(Default)]
pub struct PatternCatalog {
    flavors: RwLock<HashMap<String, FlavorPatterns>>,
}

impl PatternCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the built-in "classic" flavor's patterns (see
    /// `pattern::defaults`) and returns the populated catalog.
    pub fn with_defaults() -> Result<Self> {
        let catalog = Self::new();
        catalog.register_many("classic", super::defaults::classic_patterns())?;
        Ok(catalog)
    }

    pub fn register(&self, flavor: &str, def: PatternDefinition) -> Result<()> {
        let regex = Regex::new(def.pattern)
            .map_err(|e| BridgeError::Config(format!("pattern `{}` invalid: {e}", def.kind)))?;
        let compiled = CompiledPattern {
            kind: def.kind.to_string(),
            regex,
        };
        let mut flavors = self.flavors.write().unwrap();
        flavors
            .entry(flavor.to_string())
            .or_default()
            .group_mut(def.group)
            .push(compiled);
        Ok(())
    }

    pub fn register_many(&self, flavor: &str, defs: Vec<PatternDefinition>) -> Result<()> {
        for def in defs {
            self.register(flavor, def)?;
        }
        Ok(())
    }

    /// Runs `f` against the compiled patterns for `(flavor, group)`, in
    /// registration order. Unknown flavors see an empty list rather than an
    /// error, so the Classifier can fall through to `Unknown` uniformly.
    pub fn with_group<F, R>(&self, flavor: &str, group: PatternGroup, f: F) -> R
    where
        F: FnOnce(&[CompiledPattern]) -> R,
    {
        let flavors = self.flavors.read().unwrap();
        match flavors.get(flavor) {
            Some(patterns) => f(patterns.group(group)),
            None => f(&[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_round_trips() {
        let catalog = PatternCatalog::new();
        catalog
            .register(
                "classic",
                PatternDefinition {
                    group: PatternGroup::GuildChat,
                    kind: "guild_chat",
                    pattern: r"^Guild > (?P<username>\w+): (?P<message>.*)$",
                },
            )
            .unwrap();

        let matched = catalog.with_group("classic", PatternGroup::GuildChat, |pats| {
            pats.iter().any(|p| p.regex.is_match("Guild > Alice: hi"))
        });
        assert!(matched);
    }

    #[test]
    fn unknown_flavor_yields_empty_group() {
        let catalog = PatternCatalog::new();
        let count = catalog.with_group("nonexistent", PatternGroup::Event, |pats| pats.len());
        assert_eq!(count, 0);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let catalog = PatternCatalog::new();
        let err = catalog.register(
            "classic",
            PatternDefinition {
                group: PatternGroup::Event,
                kind: "broken",
                pattern: "(unclosed",
            },
        );
        assert!(err.is_err());
    }
}
