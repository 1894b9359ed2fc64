//! Navigation handling
//!
//! Entry points for the background navigation hook and the content script's
//! location check. Both read rules through the [`RuleCache`] and hand any
//! rewrite to a [`NavigationSink`].

use crate::cache::{RuleCache, RuleSnapshot};
use crate::record::StoredState;
use crate::store::{MemoryStore, SettingsStore, StoreError};
use crate::types::ChangedKeys;

/// Where rewritten URLs go. Implementations must replace the current entry
/// rather than push a new history entry.
pub trait NavigationSink {
    fn replace_current_url(&mut self, url: &str);
}

/// Records every replacement; used by the CLI and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub urls: Vec<String>,
}

impl NavigationSink for RecordingSink {
    fn replace_current_url(&mut self, url: &str) {
        self.urls.push(url.to_string());
    }
}

/// What happened to a navigation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Not the top-level frame
    IgnoredFrame,
    /// Global toggle is off
    Disabled,
    /// No rule fired, or the result equals the input
    Unchanged,
    /// URL could not be parsed
    InvalidUrl,
    /// Sink was asked to load this URL
    Redirected(String),
}

pub struct NavigationHandler<S> {
    store: S,
    cache: RuleCache,
}

impl<S: SettingsStore> NavigationHandler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: RuleCache::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a write against the store and invalidate the cache for it.
    pub fn with_store<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut S) -> Result<T, StoreError>,
    {
        let result = f(&mut self.store);
        self.cache.invalidate(ChangedKeys::ALL);
        result
    }

    /// Forward a storage change notification.
    pub fn on_storage_changed(&mut self, keys: ChangedKeys) {
        self.cache.invalidate(keys);
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    pub fn snapshot(&mut self) -> Result<&RuleSnapshot, StoreError> {
        self.cache.get(&self.store)
    }

    /// Background hook: one call per committed navigation.
    pub fn on_committed<K: NavigationSink + ?Sized>(
        &mut self,
        url: &str,
        is_top_level: bool,
        sink: &mut K,
    ) -> Result<NavigationOutcome, StoreError> {
        if !is_top_level {
            return Ok(NavigationOutcome::IgnoredFrame);
        }
        self.check_location(url, sink)
    }

    /// Content-script check of the current location.
    pub fn check_location<K: NavigationSink + ?Sized>(
        &mut self,
        url: &str,
        sink: &mut K,
    ) -> Result<NavigationOutcome, StoreError> {
        let snapshot = self.cache.get(&self.store)?;
        if !snapshot.settings.enabled {
            return Ok(NavigationOutcome::Disabled);
        }

        match snapshot.rewrite(url) {
            Ok(Some(target)) => {
                sink.replace_current_url(&target);
                Ok(NavigationOutcome::Redirected(target))
            }
            Ok(None) => Ok(NavigationOutcome::Unchanged),
            Err(e) => {
                log::debug!("{}", e);
                Ok(NavigationOutcome::InvalidUrl)
            }
        }
    }
}

impl NavigationHandler<MemoryStore> {
    /// Swap in a fresh copy of the host's state, invalidating only what changed.
    pub fn replace_state(&mut self, state: StoredState) -> ChangedKeys {
        let changed = self.store.replace(state);
        self.cache.invalidate(changed);
        changed
    }
}
