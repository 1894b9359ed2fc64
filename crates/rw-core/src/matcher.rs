//! Rule Matcher
//!
//! Selects the rules that apply to a hostname. Matching is a linear filter
//! that preserves the stored order, which is also the application order.

use crate::types::{Rule, RuleAction};

/// Check whether `host` equals `domain` or is a subdomain of it.
///
/// `domain` is expected lowercased (see [`Rule::domain`]); `host` is compared
/// case-insensitively.
#[inline]
pub fn domain_matches(host: &str, domain: &str) -> bool {
    if domain.is_empty() || host.len() < domain.len() {
        return false;
    }

    let host = host.as_bytes();
    let domain = domain.as_bytes();
    let split = host.len() - domain.len();

    if !host[split..].eq_ignore_ascii_case(domain) {
        return false;
    }

    // Exact match, or the suffix starts right after a label separator
    split == 0 || host[split - 1] == b'.'
}

/// Enabled rules whose domain matches `host`, in input order.
pub fn matching_rules<'r>(rules: &'r [Rule], host: &'r str) -> impl Iterator<Item = &'r Rule> + 'r {
    rules
        .iter()
        .filter(move |rule| rule.enabled && domain_matches(host, &rule.domain))
}

/// Matching rules that rewrite the URL (`remove`, `add`, `redirect`).
pub fn url_rules<'r>(rules: &'r [Rule], host: &'r str) -> impl Iterator<Item = &'r Rule> + 'r {
    matching_rules(rules, host).filter(|rule| rule.action.rewrites_url())
}

/// Selectors of matching `hideElement` rules, in input order.
pub fn hide_selectors<'r>(rules: &'r [Rule], host: &str) -> Vec<&'r str> {
    rules
        .iter()
        .filter(|rule| rule.enabled && domain_matches(host, &rule.domain))
        .filter_map(|rule| match &rule.action {
            RuleAction::HideElement { selector } => Some(selector.as_str()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: i64, domain: &str, action: RuleAction) -> Rule {
        Rule::new(id, domain, action)
    }

    fn hide(selector: &str) -> RuleAction {
        RuleAction::HideElement {
            selector: selector.into(),
        }
    }

    fn remove(parameter: &str) -> RuleAction {
        RuleAction::Remove {
            parameter: parameter.into(),
            value: None,
        }
    }

    #[test]
    fn test_domain_matches() {
        assert!(domain_matches("example.com", "example.com"));
        assert!(domain_matches("sub.example.com", "example.com"));
        assert!(domain_matches("a.b.example.com", "example.com"));
        assert!(domain_matches("SUB.Example.com", "example.com"));
        assert!(!domain_matches("notexample.com", "example.com"));
        assert!(!domain_matches("example.com.evil.net", "example.com"));
        assert!(!domain_matches("com", "example.com"));
        assert!(!domain_matches("example.com", ""));
    }

    #[test]
    fn test_matching_rules_filters_and_keeps_order() {
        let mut disabled = rule(2, "example.com", remove("b"));
        disabled.enabled = false;

        let rules = vec![
            rule(1, "example.com", remove("a")),
            disabled,
            rule(3, "other.org", remove("c")),
            rule(4, "sub.example.com", remove("d")),
            rule(5, "example.com", hide(".ad")),
        ];

        let ids: Vec<i64> = matching_rules(&rules, "sub.example.com").map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4, 5]);

        let ids: Vec<i64> = matching_rules(&rules, "example.com").map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 5]);

        let ids: Vec<i64> = url_rules(&rules, "sub.example.com").map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn test_hide_selectors() {
        let rules = vec![
            rule(1, "example.com", hide(".ad-banner")),
            rule(2, "example.com", remove("x")),
            rule(3, "news.example.com", hide("#promo")),
            rule(4, "other.org", hide(".nope")),
        ];

        assert_eq!(hide_selectors(&rules, "news.example.com"), vec![".ad-banner", "#promo"]);
        assert_eq!(hide_selectors(&rules, "www.example.com"), vec![".ad-banner"]);
        assert!(hide_selectors(&rules, "example.net").is_empty());
    }
}
