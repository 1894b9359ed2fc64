//! Core type definitions for ReWrite
//!
//! The typed rule model used by the matcher, the URL transformer and the
//! element hider. Stored JSON records live in [`crate::record`] and are
//! converted into these types before evaluation.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Rule Actions
// =============================================================================

/// Discriminant of a [`RuleAction`], matching the stored `action` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Remove a query parameter
    Remove,
    /// Add or overwrite a query parameter
    Add,
    /// Rewrite a path prefix
    Redirect,
    /// Hide page elements matching a CSS selector
    HideElement,
}

impl ActionKind {
    /// Wire name used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Add => "add",
            Self::Redirect => "redirect",
            Self::HideElement => "hideElement",
        }
    }

    /// Parse a stored action name. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "remove" => Some(Self::Remove),
            "add" => Some(Self::Add),
            "redirect" => Some(Self::Redirect),
            "hideElement" => Some(Self::HideElement),
            _ => None,
        }
    }

    pub const ALL: [ActionKind; 4] = [Self::Remove, Self::Add, Self::Redirect, Self::HideElement];
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a rule does once its domain matches.
///
/// Each variant carries only the fields its action needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleAction {
    /// Delete `parameter`; when `value` is set, only if the current value equals it.
    Remove {
        parameter: String,
        value: Option<String>,
    },
    /// Set `parameter` to `value` unless it already has that value.
    Add { parameter: String, value: String },
    /// Replace the `from_path` prefix of the path with `to_path`.
    Redirect { from_path: String, to_path: String },
    /// Hide every element matching `selector`.
    HideElement { selector: String },
}

impl RuleAction {
    #[inline]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Remove { .. } => ActionKind::Remove,
            Self::Add { .. } => ActionKind::Add,
            Self::Redirect { .. } => ActionKind::Redirect,
            Self::HideElement { .. } => ActionKind::HideElement,
        }
    }

    /// True for actions that change the URL.
    #[inline]
    pub fn rewrites_url(&self) -> bool {
        !matches!(self, Self::HideElement { .. })
    }
}

// =============================================================================
// Rule
// =============================================================================

/// A validated rule ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    pub id: i64,
    /// Hostname suffix pattern, lowercased
    pub domain: String,
    pub enabled: bool,
    pub action: RuleAction,
}

impl Rule {
    pub fn new(id: i64, domain: impl Into<String>, action: RuleAction) -> Self {
        Self {
            id,
            domain: domain.into().to_ascii_lowercase(),
            enabled: true,
            action,
        }
    }

    /// The selector of a `hideElement` rule.
    pub fn selector(&self) -> Option<&str> {
        match &self.action {
            RuleAction::HideElement { selector } => Some(selector),
            _ => None,
        }
    }
}

/// Why a stored record could not become a [`Rule`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("missing field '{field}' for action '{action}'")]
    MissingField {
        action: ActionKind,
        field: &'static str,
    },
    #[error("missing domain")]
    MissingDomain,
}

// =============================================================================
// Settings
// =============================================================================

/// Global settings gating all rule application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// =============================================================================
// Change Notifications
// =============================================================================

bitflags::bitflags! {
    /// Storage keys reported by a change notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangedKeys: u8 {
        /// The `rules` key
        const RULES = 1 << 0;
        /// The `enabled` key
        const ENABLED = 1 << 1;

        const ALL = Self::RULES.bits() | Self::ENABLED.bits();
    }
}

impl ChangedKeys {
    /// Build from storage key names. Unrelated keys are ignored.
    pub fn from_key_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().fold(Self::empty(), |acc, name| match name {
            "rules" => acc | Self::RULES,
            "enabled" => acc | Self::ENABLED,
            _ => acc,
        })
    }
}
