//! Read-through rule cache
//!
//! Holds the last parsed copy of the store, tagged with the [`Version`] it
//! was loaded at. A change notification bumps the version; the next read sees
//! the mismatch and reloads from the store. Everything here runs on one
//! thread, so there is no locking.

use crate::matcher::hide_selectors;
use crate::record::StoredState;
use crate::store::{SettingsStore, StoreError};
use crate::transform::{rewrite_url, TransformError};
use crate::types::{ChangedKeys, Rule, Settings};

/// Monotonic token identifying a generation of the stored state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    #[inline]
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Parsed rules and settings at one version.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    pub version: Version,
    pub settings: Settings,
    /// Rules that converted cleanly, in stored order
    pub rules: Vec<Rule>,
    /// Stored records that failed conversion and are ignored
    pub skipped: usize,
}

impl RuleSnapshot {
    pub fn from_state(state: &StoredState, version: Version) -> Self {
        let mut rules = Vec::with_capacity(state.rules().len());
        let mut skipped = 0;

        for stored in state.rules() {
            match stored.to_rule() {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    log::debug!("ignoring rule {}: {}", stored.id, e);
                    skipped += 1;
                }
            }
        }

        Self {
            version,
            settings: state.settings(),
            rules,
            skipped,
        }
    }

    /// Rewrite candidate for `url`, `None` when disabled or nothing changes.
    pub fn rewrite(&self, url: &str) -> Result<Option<String>, TransformError> {
        if !self.settings.enabled || self.rules.is_empty() {
            return Ok(None);
        }
        rewrite_url(&self.rules, url)
    }

    /// Active hide selectors for `host`. Empty when disabled.
    pub fn hide_selectors(&self, host: &str) -> Vec<&str> {
        if !self.settings.enabled {
            return Vec::new();
        }
        hide_selectors(&self.rules, host)
    }
}

#[derive(Debug, Default)]
pub struct RuleCache {
    current: Version,
    snapshot: Option<RuleSnapshot>,
    loads: u64,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version the next read must match.
    pub fn version(&self) -> Version {
        self.current
    }

    /// Number of times the store was actually read.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    /// Handle a change notification. Returns true if the cache went stale.
    pub fn invalidate(&mut self, keys: ChangedKeys) -> bool {
        if !keys.intersects(ChangedKeys::ALL) {
            return false;
        }
        self.current = self.current.next();
        log::debug!("rule cache invalidated ({:?}), now at v{}", keys, self.current.get());
        true
    }

    /// Return the snapshot for the current version, reading the store if stale.
    pub fn get<S: SettingsStore + ?Sized>(&mut self, store: &S) -> Result<&RuleSnapshot, StoreError> {
        let snapshot = match self.snapshot.take() {
            Some(snapshot) if snapshot.version == self.current => snapshot,
            _ => {
                let state = store.get()?;
                self.loads += 1;
                RuleSnapshot::from_state(&state, self.current)
            }
        };
        Ok(self.snapshot.insert(snapshot))
    }

    /// Cached snapshot if it is still current.
    pub fn peek(&self) -> Option<&RuleSnapshot> {
        self.snapshot
            .as_ref()
            .filter(|snapshot| snapshot.version == self.current)
    }
}
