//! Settings store
//!
//! The engine reads rules and the global toggle from a key-value store it
//! does not own. [`SettingsStore`] is the contract; [`MemoryStore`] keeps the
//! state in process and is what tests, the CLI and the wasm host mirror use.

use std::cell::Cell;

use thiserror::Error;

use crate::record::{StatePatch, StoredRule, StoredState};
use crate::types::{ChangedKeys, RuleError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rule {0} not found")]
    RuleNotFound(i64),
    #[error("invalid rule: {0}")]
    InvalidRule(#[from] RuleError),
    #[error("malformed state: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Key-value store holding `rules` and `enabled`.
pub trait SettingsStore {
    /// Read the full state.
    fn get(&self) -> Result<StoredState, StoreError>;

    /// Write the keys present in `patch`. Returns the keys whose value changed.
    fn set(&mut self, patch: StatePatch) -> Result<ChangedKeys, StoreError>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for Box<S> {
    fn get(&self) -> Result<StoredState, StoreError> {
        (**self).get()
    }

    fn set(&mut self, patch: StatePatch) -> Result<ChangedKeys, StoreError> {
        (**self).set(patch)
    }
}

/// Merge `patch` into `state`, reporting which keys changed.
pub fn merge_patch(state: &mut StoredState, patch: StatePatch) -> ChangedKeys {
    let mut changed = ChangedKeys::empty();

    if let Some(rules) = patch.rules {
        if state.rules.as_ref() != Some(&rules) {
            changed |= ChangedKeys::RULES;
        }
        state.rules = Some(rules);
    }

    if let Some(enabled) = patch.enabled {
        if state.enabled != Some(enabled) {
            changed |= ChangedKeys::ENABLED;
        }
        state.enabled = Some(enabled);
    }

    changed
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: StoredState,
    reads: Cell<u64>,
}

impl MemoryStore {
    pub fn new(state: StoredState) -> Self {
        Self {
            state,
            reads: Cell::new(0),
        }
    }

    /// Replace the whole state, as when the host pushes a fresh copy.
    pub fn replace(&mut self, state: StoredState) -> ChangedKeys {
        let mut changed = ChangedKeys::empty();
        if self.state.rules != state.rules {
            changed |= ChangedKeys::RULES;
        }
        if self.state.enabled != state.enabled {
            changed |= ChangedKeys::ENABLED;
        }
        self.state = state;
        changed
    }

    pub fn state(&self) -> &StoredState {
        &self.state
    }

    /// Number of `get` calls served.
    pub fn reads(&self) -> u64 {
        self.reads.get()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self) -> Result<StoredState, StoreError> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.state.clone())
    }

    fn set(&mut self, patch: StatePatch) -> Result<ChangedKeys, StoreError> {
        Ok(merge_patch(&mut self.state, patch))
    }
}

// =============================================================================
// Installation Defaults
// =============================================================================

/// Rules written on first install.
pub fn default_rules(now_ms: i64) -> Vec<StoredRule> {
    vec![
        StoredRule {
            id: now_ms,
            domain: "marmalade-ai.com".into(),
            action: "remove".into(),
            enabled: true,
            parameter: Some("debug_mode".into()),
            value: Some("true".into()),
            ..Default::default()
        },
        StoredRule {
            id: now_ms + 1,
            domain: "gemini.google.com".into(),
            action: "redirect".into(),
            enabled: true,
            from_path: Some("/u/0".into()),
            to_path: Some("/u/2".into()),
            ..Default::default()
        },
    ]
}

/// Seed missing keys with defaults. Existing keys are left alone.
pub fn install_defaults<S: SettingsStore + ?Sized>(
    store: &mut S,
    now_ms: i64,
) -> Result<ChangedKeys, StoreError> {
    let state = store.get()?;
    let mut patch = StatePatch::default();

    if state.rules.is_none() {
        patch.rules = Some(default_rules(now_ms));
    }
    if state.enabled.is_none() {
        patch.enabled = Some(true);
    }

    if patch.rules.is_none() && patch.enabled.is_none() {
        return Ok(ChangedKeys::empty());
    }

    log::info!("installing default settings");
    store.set(patch)
}
