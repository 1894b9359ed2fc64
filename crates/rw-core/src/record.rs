//! Stored record format
//!
//! These structs mirror the JSON kept in the extension's key-value store
//! (`{ rules: [...], enabled: bool }`). Every field is optional on read so a
//! malformed record never makes the whole state unreadable; conversion into
//! the typed [`Rule`] is where validation happens.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{ActionKind, Rule, RuleAction, RuleError, Settings};

/// Key under which the rule list is stored.
pub const RULES_KEY: &str = "rules";
/// Key under which the global toggle is stored.
pub const ENABLED_KEY: &str = "enabled";

/// One rule as persisted in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StoredRule {
    #[serde(default)]
    #[ts(type = "number")]
    pub id: i64,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub parameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub from_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub to_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub selector: Option<String>,
}

/// Full contents of the store. Absent keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub rules: Option<Vec<StoredRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub enabled: Option<bool>,
}

/// A partial write to the store. `None` fields are left untouched.
pub type StatePatch = StoredState;

impl StoredState {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Stored rules, empty when the key is absent.
    pub fn rules(&self) -> &[StoredRule] {
        self.rules.as_deref().unwrap_or(&[])
    }

    /// Settings as seen by the background handler: a missing flag is off.
    pub fn settings(&self) -> Settings {
        Settings {
            enabled: self.enabled.unwrap_or(false),
        }
    }
}

impl StoredRule {
    /// Build the stored form of a typed rule.
    pub fn from_rule(rule: &Rule) -> Self {
        let mut stored = StoredRule {
            id: rule.id,
            domain: rule.domain.clone(),
            action: rule.action.kind().as_str().to_string(),
            enabled: rule.enabled,
            ..Default::default()
        };
        match &rule.action {
            RuleAction::Remove { parameter, value } => {
                stored.parameter = Some(parameter.clone());
                stored.value = Some(value.clone().unwrap_or_default());
            }
            RuleAction::Add { parameter, value } => {
                stored.parameter = Some(parameter.clone());
                stored.value = Some(value.clone());
            }
            RuleAction::Redirect { from_path, to_path } => {
                stored.from_path = Some(from_path.clone());
                stored.to_path = Some(to_path.clone());
            }
            RuleAction::HideElement { selector } => {
                stored.selector = Some(selector.clone());
            }
        }
        stored
    }

    /// Convert into a typed rule.
    pub fn to_rule(&self) -> Result<Rule, RuleError> {
        let kind = ActionKind::parse(&self.action)
            .ok_or_else(|| RuleError::UnknownAction(self.action.clone()))?;

        if self.domain.is_empty() {
            return Err(RuleError::MissingDomain);
        }

        let action = match kind {
            ActionKind::Remove => RuleAction::Remove {
                parameter: required(kind, "parameter", &self.parameter)?,
                value: self.value.clone().filter(|v| !v.is_empty()),
            },
            ActionKind::Add => RuleAction::Add {
                parameter: required(kind, "parameter", &self.parameter)?,
                // An empty value is a legitimate `?flag=` add
                value: self.value.clone().ok_or(RuleError::MissingField {
                    action: kind,
                    field: "value",
                })?,
            },
            ActionKind::Redirect => RuleAction::Redirect {
                from_path: required(kind, "fromPath", &self.from_path)?,
                to_path: required(kind, "toPath", &self.to_path)?,
            },
            ActionKind::HideElement => RuleAction::HideElement {
                selector: required(kind, "selector", &self.selector)?,
            },
        };

        Ok(Rule {
            id: self.id,
            domain: self.domain.to_ascii_lowercase(),
            enabled: self.enabled,
            action,
        })
    }
}

fn required(
    action: ActionKind,
    field: &'static str,
    value: &Option<String>,
) -> Result<String, RuleError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(RuleError::MissingField { action, field }),
    }
}

impl TryFrom<&StoredRule> for Rule {
    type Error = RuleError;

    fn try_from(value: &StoredRule) -> Result<Self, Self::Error> {
        value.to_rule()
    }
}

impl From<&Rule> for StoredRule {
    fn from(rule: &Rule) -> Self {
        StoredRule::from_rule(rule)
    }
}
