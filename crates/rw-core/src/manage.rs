//! Rule management
//!
//! The edits the extension popup makes to the stored rule list. Every
//! operation is a fresh read-modify-write against the store.

use crate::record::{StatePatch, StoredRule};
use crate::store::{SettingsStore, StoreError};
use crate::types::{ActionKind, Rule, RuleAction};

/// A rule as entered by the user, before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDraft {
    pub domain: String,
    pub action: RuleAction,
}

/// Raw form fields. Blank strings count as missing.
#[derive(Debug, Clone, Default)]
pub struct DraftFields<'a> {
    pub parameter: Option<&'a str>,
    pub value: Option<&'a str>,
    pub from_path: Option<&'a str>,
    pub to_path: Option<&'a str>,
    pub selector: Option<&'a str>,
}

impl RuleDraft {
    /// Validate form input. Text fields are trimmed.
    pub fn parse(domain: &str, action: &str, fields: &DraftFields<'_>) -> Result<Self, StoreError> {
        let trim = |v: Option<&str>| v.map(|s| s.trim().to_string());

        let mut stored = StoredRule {
            domain: domain.trim().to_string(),
            action: action.trim().to_string(),
            enabled: true,
            parameter: trim(fields.parameter),
            value: trim(fields.value),
            from_path: trim(fields.from_path),
            to_path: trim(fields.to_path),
            selector: trim(fields.selector),
            ..Default::default()
        };
        // Form submits always carry a value box for add
        if stored.action == ActionKind::Add.as_str() && stored.value.is_none() {
            stored.value = Some(String::new());
        }

        let rule = stored.to_rule()?;
        Ok(Self {
            domain: rule.domain,
            action: rule.action,
        })
    }
}

fn load_rules<S: SettingsStore + ?Sized>(store: &S) -> Result<Vec<StoredRule>, StoreError> {
    Ok(store.get()?.rules.unwrap_or_default())
}

fn save_rules<S: SettingsStore + ?Sized>(store: &mut S, rules: Vec<StoredRule>) -> Result<(), StoreError> {
    store.set(StatePatch {
        rules: Some(rules),
        ..Default::default()
    })?;
    Ok(())
}

/// Append a new enabled rule. Its id is `now_ms`, bumped past existing ids.
pub fn add_rule<S: SettingsStore + ?Sized>(
    store: &mut S,
    draft: RuleDraft,
    now_ms: i64,
) -> Result<StoredRule, StoreError> {
    let mut rules = load_rules(store)?;
    let next_free = rules.iter().map(|r| r.id.saturating_add(1)).max().unwrap_or(i64::MIN);
    let id = now_ms.max(next_free);

    let stored = StoredRule::from_rule(&Rule {
        id,
        domain: draft.domain,
        enabled: true,
        action: draft.action,
    });
    rules.push(stored.clone());
    save_rules(store, rules)?;

    log::debug!("added rule {}", id);
    Ok(stored)
}

/// Replace a rule's domain and action. Fields of other actions are dropped;
/// the enabled flag is kept.
pub fn edit_rule<S: SettingsStore + ?Sized>(
    store: &mut S,
    id: i64,
    draft: RuleDraft,
) -> Result<StoredRule, StoreError> {
    let mut rules = load_rules(store)?;
    let slot = rules
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or(StoreError::RuleNotFound(id))?;

    *slot = StoredRule::from_rule(&Rule {
        id,
        domain: draft.domain,
        enabled: slot.enabled,
        action: draft.action,
    });
    let edited = slot.clone();
    save_rules(store, rules)?;
    Ok(edited)
}

/// Flip a rule's enabled flag. Returns the new value.
pub fn toggle_rule<S: SettingsStore + ?Sized>(store: &mut S, id: i64) -> Result<bool, StoreError> {
    let mut rules = load_rules(store)?;
    let rule = rules
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or(StoreError::RuleNotFound(id))?;

    rule.enabled = !rule.enabled;
    let enabled = rule.enabled;
    save_rules(store, rules)?;
    Ok(enabled)
}

pub fn delete_rule<S: SettingsStore + ?Sized>(store: &mut S, id: i64) -> Result<StoredRule, StoreError> {
    let mut rules = load_rules(store)?;
    let pos = rules
        .iter()
        .position(|r| r.id == id)
        .ok_or(StoreError::RuleNotFound(id))?;

    let removed = rules.remove(pos);
    save_rules(store, rules)?;
    Ok(removed)
}

/// Set the global toggle.
pub fn set_enabled<S: SettingsStore + ?Sized>(store: &mut S, enabled: bool) -> Result<(), StoreError> {
    store.set(StatePatch {
        enabled: Some(enabled),
        ..Default::default()
    })?;
    Ok(())
}

/// One-line summary of a stored rule, as shown in the rule list.
pub fn describe(rule: &StoredRule) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_default();

    match ActionKind::parse(&rule.action) {
        Some(ActionKind::Redirect) => {
            format!("Redirect from {} to {}", field(&rule.from_path), field(&rule.to_path))
        }
        Some(kind @ (ActionKind::Remove | ActionKind::Add)) => {
            let verb = if kind == ActionKind::Remove { "Remove" } else { "Add" };
            match rule.value.as_deref() {
                Some(v) if !v.is_empty() => {
                    format!("{} parameter: {} = {}", verb, field(&rule.parameter), v)
                }
                _ => format!("{} parameter: {}", verb, field(&rule.parameter)),
            }
        }
        Some(ActionKind::HideElement) => format!("Hide elements: {}", field(&rule.selector)),
        None => format!("Unknown action '{}'", rule.action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StoredState;
    use crate::store::MemoryStore;
    use crate::types::RuleError;

    fn draft(domain: &str, action: &str, fields: DraftFields<'_>) -> RuleDraft {
        RuleDraft::parse(domain, action, &fields).unwrap()
    }

    fn remove_draft(parameter: &str) -> RuleDraft {
        draft(
            "example.com",
            "remove",
            DraftFields {
                parameter: Some(parameter),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_draft_trims_and_validates() {
        let d = draft(
            "  News.Example.com ",
            "redirect",
            DraftFields {
                from_path: Some(" /old "),
                to_path: Some("/new"),
                ..Default::default()
            },
        );
        assert_eq!(d.domain, "news.example.com");
        assert_eq!(
            d.action,
            RuleAction::Redirect {
                from_path: "/old".into(),
                to_path: "/new".into()
            }
        );

        let err = RuleDraft::parse(" ", "remove", &DraftFields::default()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRule(RuleError::MissingDomain)));

        let err = RuleDraft::parse("example.com", "add", &DraftFields::default()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidRule(RuleError::MissingField { field: "parameter", .. })
        ));
    }

    #[test]
    fn test_add_rule_assigns_unique_ids() {
        let mut store = MemoryStore::default();
        let a = add_rule(&mut store, remove_draft("a"), 100).unwrap();
        let b = add_rule(&mut store, remove_draft("b"), 100).unwrap();
        assert_eq!(a.id, 100);
        assert_eq!(b.id, 101);
        assert!(b.enabled);
        assert_eq!(store.state().rules().len(), 2);
    }

    #[test]
    fn test_edit_rule_clears_other_fields() {
        let mut store = MemoryStore::default();
        let rule = add_rule(&mut store, remove_draft("a"), 1).unwrap();
        toggle_rule(&mut store, rule.id).unwrap();

        let edited = edit_rule(
            &mut store,
            rule.id,
            draft(
                "example.com",
                "hideElement",
                DraftFields {
                    selector: Some(".ad"),
                    ..Default::default()
                },
            ),
        )
        .unwrap();

        assert_eq!(edited.parameter, None);
        assert_eq!(edited.value, None);
        assert_eq!(edited.selector.as_deref(), Some(".ad"));
        assert!(!edited.enabled, "edit keeps the enabled flag");
    }

    #[test]
    fn test_toggle_and_delete() {
        let mut store = MemoryStore::default();
        let rule = add_rule(&mut store, remove_draft("a"), 1).unwrap();

        assert!(!toggle_rule(&mut store, rule.id).unwrap());
        assert!(toggle_rule(&mut store, rule.id).unwrap());

        let removed = delete_rule(&mut store, rule.id).unwrap();
        assert_eq!(removed.id, rule.id);
        assert!(store.state().rules().is_empty());

        assert!(matches!(delete_rule(&mut store, rule.id), Err(StoreError::RuleNotFound(1))));
        assert!(matches!(toggle_rule(&mut store, 42), Err(StoreError::RuleNotFound(42))));
    }

    #[test]
    fn test_set_enabled() {
        let mut store = MemoryStore::new(StoredState::default());
        set_enabled(&mut store, false).unwrap();
        assert_eq!(store.state().enabled, Some(false));
    }

    #[test]
    fn test_describe() {
        let mut rule = StoredRule {
            action: "remove".into(),
            parameter: Some("debug_mode".into()),
            value: Some("true".into()),
            ..Default::default()
        };
        assert_eq!(describe(&rule), "Remove parameter: debug_mode = true");

        rule.action = "add".into();
        rule.value = Some(String::new());
        assert_eq!(describe(&rule), "Add parameter: debug_mode");

        let rule = StoredRule {
            action: "redirect".into(),
            from_path: Some("/u/0".into()),
            to_path: Some("/u/2".into()),
            ..Default::default()
        };
        assert_eq!(describe(&rule), "Redirect from /u/0 to /u/2");

        let rule = StoredRule {
            action: "hideElement".into(),
            selector: Some(".ad-banner".into()),
            ..Default::default()
        };
        assert_eq!(describe(&rule), "Hide elements: .ad-banner");
    }
}
