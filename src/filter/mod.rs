//! Access filter subsystem.
//!
//! # Data Flow
//! ```text
//! filter file (one rule per line)
//!     → loader.rs (read, size guard)
//!     → rule.rs (parse each line, skip malformed)
//!     → RuleSet (ordered, immutable)
//!     → RuleStore (atomic swap, snapshot per request)
//!
//! On file change:
//!     watcher.rs → loader.rs → RuleStore::replace
//! ```
//!
//! # Design Decisions
//! - Blocklist semantics: any matching rule blocks
//! - Linear scan, first match wins
//! - In-flight requests keep the snapshot they started with

pub mod loader;
pub mod rule;
pub mod watcher;

use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwap;

pub use loader::{load_rules, FilterError};
pub use rule::{FilterRule, RuleParseError};
pub use watcher::RuleWatcher;

/// Outcome of evaluating a target against the rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Blocked,
}

/// An ordered, immutable collection of filter rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<FilterRule>,
}

impl RuleSet {
    /// Build a rule set from text lines, skipping anything unparsable.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        let mut skipped = 0usize;

        for (idx, line) in lines.into_iter().enumerate() {
            match FilterRule::parse(line.as_ref()) {
                Ok(Some(rule)) => rules.push(rule),
                Ok(None) => {}
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(line = idx + 1, error = %e, "Skipping filter rule");
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, loaded = rules.len(), "Some filter rules were malformed");
        }

        Self { rules }
    }

    /// Evaluate a host and its resolved address against every rule.
    pub fn decide(&self, host: &str, addr: Ipv4Addr) -> AccessDecision {
        match self.matching_rule(host, addr) {
            Some(_) => AccessDecision::Blocked,
            None => AccessDecision::Allowed,
        }
    }

    /// First rule matching the target, if any.
    fn matching_rule(&self, host: &str, addr: Ipv4Addr) -> Option<&FilterRule> {
        self.rules.iter().find(|rule| rule.matches(host, addr))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Holder for the live rule set.
///
/// Readers take a snapshot per request; reloads swap the whole set atomically.
#[derive(Debug)]
pub struct RuleStore {
    current: ArcSwap<RuleSet>,
}

impl RuleStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(rules),
        }
    }

    /// Current rules, pinned for the lifetime of the returned `Arc`.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Replace the rule set for all subsequent snapshots.
    pub fn replace(&self, rules: RuleSet) {
        tracing::info!(rules = rules.len(), "Filter rules replaced");
        self.current.store(Arc::new(rules));
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}
