//! ReWrite Core Library
//!
//! This crate provides the rule engine behind the ReWrite browser extension:
//! per-domain rules that strip or add query parameters, rewrite path
//! prefixes, and hide page elements.
//!
//! # Architecture
//!
//! Rules are stored by the extension as JSON records. The engine converts
//! them into typed [`Rule`]s, filters them by hostname, and either computes a
//! rewritten URL or a set of selectors to hide. Storage, navigation and the
//! DOM are reached through traits so the same engine runs in the background
//! service, the content script and the CLI.
//!
//! # Modules
//!
//! - `types`: Typed rule model and change-notification flags
//! - `record`: Stored JSON record format
//! - `matcher`: Hostname matching
//! - `query`: Query string editing
//! - `transform`: URL rewriting
//! - `store`: Settings store trait, in-memory store, install defaults
//! - `cache`: Read-through cache of parsed rules
//! - `navigation`: Background and content-script entry points
//! - `hider`: Element hiding with an owned mutation subscription
//! - `manage`: Rule list edits made from the popup

pub mod types;
pub mod record;
pub mod matcher;
pub mod query;
pub mod transform;
pub mod store;
pub mod cache;
pub mod navigation;
pub mod hider;
pub mod manage;

// Re-export commonly used types
pub use cache::{RuleCache, RuleSnapshot, Version};
pub use hider::{DomSurface, MutationSubscription, PageHider, SelectorError};
pub use matcher::{domain_matches, hide_selectors, matching_rules};
pub use navigation::{NavigationHandler, NavigationOutcome, NavigationSink};
pub use record::{StatePatch, StoredRule, StoredState};
pub use store::{MemoryStore, SettingsStore, StoreError};
pub use transform::{rewrite, rewrite_url, TransformError};
pub use types::{ActionKind, ChangedKeys, Rule, RuleAction, RuleError, Settings};
