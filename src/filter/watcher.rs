//! Filter file watcher for live rule reloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::filter::loader::load_rules;
use crate::filter::RuleStore;

/// Watches the filter file and swaps freshly loaded rules into a [`RuleStore`].
pub struct RuleWatcher {
    path: PathBuf,
    store: Arc<RuleStore>,
}

impl RuleWatcher {
    pub fn new(path: &Path, store: Arc<RuleStore>) -> Self {
        Self {
            path: path.to_path_buf(),
            store,
        }
    }

    /// Re-read the file into the store. A failed load keeps the current rules.
    pub fn reload(&self) -> bool {
        reload_into(&self.path, &self.store)
    }

    /// Start watching. The watcher stops when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let store = self.store.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %path.display(), "Filter file change detected, reloading");
                        reload_into(&path, &store);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Filter watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Filter watcher started");
        Ok(watcher)
    }
}

fn reload_into(path: &Path, store: &RuleStore) -> bool {
    match load_rules(path) {
        Ok(rules) => {
            store.replace(rules);
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload filter rules. Keeping current rules.");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::Ipv4Addr;

    use crate::filter::{AccessDecision, RuleSet};

    #[test]
    fn reload_picks_up_new_rules() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first.example").unwrap();

        let store = Arc::new(RuleStore::new(load_rules(file.path()).unwrap()));
        let watcher = RuleWatcher::new(file.path(), store.clone());

        writeln!(file, "second.example").unwrap();
        file.flush().unwrap();
        assert!(watcher.reload());

        let rules = store.snapshot();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.decide("second.example", Ipv4Addr::LOCALHOST), AccessDecision::Blocked);
    }

    #[test]
    fn failed_reload_keeps_rules() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RuleStore::new(RuleSet::from_lines(["kept.example"])));
        let watcher = RuleWatcher::new(&dir.path().join("missing.txt"), store.clone());

        assert!(!watcher.reload());
        assert_eq!(store.snapshot().len(), 1);
    }
}
