//! Element Hider
//!
//! Hides elements matching the active `hideElement` selectors, both on the
//! initial document and on nodes inserted later. The DOM is reached through
//! [`DomSurface`]; the mutation subscription is an explicit object owned by
//! [`PageHider`] and exists only while at least one selector is active.
//!
//! Dropping a selector stops future hides but does not restore elements that
//! were already hidden.

use thiserror::Error;

use crate::cache::RuleSnapshot;

/// Attribute set on every element this crate hides.
pub const HIDDEN_MARKER: &str = "data-rw-hidden";

/// Inline style applied to hidden elements.
pub const HIDDEN_STYLE: &str = "display: none !important";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector '{selector}': {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// A live mutation subscription. Disconnecting stops delivery.
pub trait MutationSubscription {
    fn disconnect(&mut self);
}

/// The slice of the DOM the hider needs.
pub trait DomSurface {
    type Element;
    type Subscription: MutationSubscription;

    /// Elements matching `selector` below `scope`, or in the whole document.
    fn query_selector_all(
        &self,
        scope: Option<&Self::Element>,
        selector: &str,
    ) -> Result<Vec<Self::Element>, SelectorError>;

    /// Whether `element` itself matches `selector`.
    fn matches(&self, element: &Self::Element, selector: &str) -> Result<bool, SelectorError>;

    /// Whether `element` already carries [`HIDDEN_MARKER`].
    fn is_hidden(&self, element: &Self::Element) -> bool;

    /// Apply [`HIDDEN_STYLE`] and [`HIDDEN_MARKER`].
    fn hide(&self, element: &Self::Element);

    /// Start delivering inserted nodes to the owner of the returned subscription.
    fn observe(&self) -> Self::Subscription;
}

pub struct PageHider<D: DomSurface> {
    dom: D,
    selectors: Vec<String>,
    subscription: Option<D::Subscription>,
    hidden: usize,
}

impl<D: DomSurface> PageHider<D> {
    pub fn new(dom: D) -> Self {
        Self {
            dom,
            selectors: Vec::new(),
            subscription: None,
            hidden: 0,
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    pub fn is_observing(&self) -> bool {
        self.subscription.is_some()
    }

    /// Elements hidden so far.
    pub fn hidden_count(&self) -> usize {
        self.hidden
    }

    /// Re-evaluate against a fresh snapshot for the page's `host`.
    pub fn refresh(&mut self, snapshot: &RuleSnapshot, host: &str) -> usize {
        let selectors = snapshot
            .hide_selectors(host)
            .into_iter()
            .map(str::to_string)
            .collect();
        self.set_selectors(selectors)
    }

    /// Replace the active selector set, hide current matches and start or
    /// stop the subscription. Returns the number of newly hidden elements.
    pub fn set_selectors(&mut self, selectors: Vec<String>) -> usize {
        self.selectors = selectors;

        if self.selectors.is_empty() {
            self.stop();
            return 0;
        }

        let count = self.apply_all();
        if self.subscription.is_none() {
            log::debug!("observing mutations for {} selector(s)", self.selectors.len());
            self.subscription = Some(self.dom.observe());
        }
        count
    }

    /// Hide every current match in the document.
    pub fn apply_all(&mut self) -> usize {
        let mut count = 0;
        for selector in &self.selectors {
            match self.dom.query_selector_all(None, selector) {
                Ok(elements) => count += hide_each(&self.dom, &elements),
                Err(e) => log::warn!("{}", e),
            }
        }
        self.hidden += count;
        count
    }

    /// Check inserted nodes, and their descendants, against the active selectors.
    pub fn on_added(&mut self, nodes: &[D::Element]) -> usize {
        if self.selectors.is_empty() {
            return 0;
        }

        let mut count = 0;
        for node in nodes {
            for selector in &self.selectors {
                match self.dom.matches(node, selector) {
                    Ok(true) if !self.dom.is_hidden(node) => {
                        self.dom.hide(node);
                        count += 1;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                        continue;
                    }
                }

                if let Ok(elements) = self.dom.query_selector_all(Some(node), selector) {
                    count += hide_each(&self.dom, &elements);
                }
            }
        }
        self.hidden += count;
        count
    }

    /// Drop the subscription and the selector set.
    pub fn stop(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            log::debug!("mutation observer stopped");
            subscription.disconnect();
        }
        self.selectors.clear();
    }
}

fn hide_each<D: DomSurface>(dom: &D, elements: &[D::Element]) -> usize {
    let mut count = 0;
    for element in elements {
        if !dom.is_hidden(element) {
            dom.hide(element);
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::cache::Version;
    use crate::record::{StoredRule, StoredState};

    struct Node {
        parent: Option<usize>,
        classes: Vec<&'static str>,
        hidden: bool,
    }

    /// Tree of nodes addressed by index. Selectors are `.class` only;
    /// anything else is rejected like a browser rejects a bad selector.
    #[derive(Default)]
    struct FakeDom {
        nodes: RefCell<Vec<Node>>,
        observers: Rc<Cell<usize>>,
    }

    struct FakeSubscription(Rc<Cell<usize>>);

    impl MutationSubscription for FakeSubscription {
        fn disconnect(&mut self) {
            self.0.set(self.0.get() - 1);
        }
    }

    impl FakeDom {
        fn insert(&self, parent: Option<usize>, classes: &[&'static str]) -> usize {
            let mut nodes = self.nodes.borrow_mut();
            nodes.push(Node {
                parent,
                classes: classes.to_vec(),
                hidden: false,
            });
            nodes.len() - 1
        }

        fn is_descendant(&self, node: usize, ancestor: usize) -> bool {
            let nodes = self.nodes.borrow();
            let mut current = nodes[node].parent;
            while let Some(p) = current {
                if p == ancestor {
                    return true;
                }
                current = nodes[p].parent;
            }
            false
        }

        fn class_of(selector: &str) -> Result<&str, SelectorError> {
            selector
                .strip_prefix('.')
                .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_alphanumeric() || ch == '-'))
                .ok_or_else(|| SelectorError {
                    selector: selector.to_string(),
                    reason: "unsupported".into(),
                })
        }

        fn hidden_flags(&self) -> Vec<bool> {
            self.nodes.borrow().iter().map(|n| n.hidden).collect()
        }
    }

    impl DomSurface for FakeDom {
        type Element = usize;
        type Subscription = FakeSubscription;

        fn query_selector_all(
            &self,
            scope: Option<&usize>,
            selector: &str,
        ) -> Result<Vec<usize>, SelectorError> {
            let class = Self::class_of(selector)?;
            let count = self.nodes.borrow().len();
            Ok((0..count)
                .filter(|&i| scope.map_or(true, |&s| self.is_descendant(i, s)))
                .filter(|&i| self.nodes.borrow()[i].classes.iter().any(|c| *c == class))
                .collect())
        }

        fn matches(&self, element: &usize, selector: &str) -> Result<bool, SelectorError> {
            let class = Self::class_of(selector)?;
            Ok(self.nodes.borrow()[*element].classes.iter().any(|c| *c == class))
        }

        fn is_hidden(&self, element: &usize) -> bool {
            self.nodes.borrow()[*element].hidden
        }

        fn hide(&self, element: &usize) {
            self.nodes.borrow_mut()[*element].hidden = true;
        }

        fn observe(&self) -> FakeSubscription {
            self.observers.set(self.observers.get() + 1);
            FakeSubscription(self.observers.clone())
        }
    }

    fn hide_rule(id: i64, selector: &str, enabled: bool) -> StoredRule {
        StoredRule {
            id,
            domain: "example.com".into(),
            action: "hideElement".into(),
            enabled,
            selector: Some(selector.into()),
            ..Default::default()
        }
    }

    fn snapshot(rules: Vec<StoredRule>) -> RuleSnapshot {
        RuleSnapshot::from_state(
            &StoredState {
                rules: Some(rules),
                enabled: Some(true),
            },
            Version::default(),
        )
    }

    #[test]
    fn test_hides_existing_and_inserted() {
        let dom = FakeDom::default();
        let root = dom.insert(None, &[]);
        dom.insert(Some(root), &["ad-banner"]);
        dom.insert(Some(root), &["content"]);

        let mut hider = PageHider::new(dom);
        let hidden = hider.refresh(&snapshot(vec![hide_rule(1, ".ad-banner", true)]), "www.example.com");
        assert_eq!(hidden, 1);
        assert!(hider.is_observing());
        assert_eq!(hider.dom().hidden_flags(), vec![false, true, false]);

        // A wrapper arrives with a matching child inside it
        let wrapper = hider.dom().insert(Some(root), &["ad-banner"]);
        hider.dom().insert(Some(wrapper), &["ad-banner"]);
        let hidden = hider.on_added(&[wrapper]);
        assert_eq!(hidden, 2);
        assert_eq!(hider.hidden_count(), 3);
    }

    #[test]
    fn test_reapply_is_idempotent() {
        let dom = FakeDom::default();
        dom.insert(None, &["ad-banner"]);

        let mut hider = PageHider::new(dom);
        assert_eq!(hider.set_selectors(vec![".ad-banner".into()]), 1);
        assert_eq!(hider.apply_all(), 0);
        assert_eq!(hider.set_selectors(vec![".ad-banner".into()]), 0);
        assert_eq!(hider.dom().observers.get(), 1);
    }

    #[test]
    fn test_invalid_selector_does_not_abort_others() {
        let dom = FakeDom::default();
        dom.insert(None, &["promo"]);

        let mut hider = PageHider::new(dom);
        let hidden = hider.set_selectors(vec!["[[broken".into(), ".promo".into()]);
        assert_eq!(hidden, 1);

        let added = hider.dom().insert(None, &["promo"]);
        assert_eq!(hider.on_added(&[added]), 1);
    }

    #[test]
    fn test_disabling_rule_stops_observing_without_unhiding() {
        let dom = FakeDom::default();
        dom.insert(None, &["ad-banner"]);

        let mut hider = PageHider::new(dom);
        hider.refresh(&snapshot(vec![hide_rule(1, ".ad-banner", true)]), "example.com");
        assert!(hider.is_observing());

        hider.refresh(&snapshot(vec![hide_rule(1, ".ad-banner", false)]), "example.com");
        assert!(!hider.is_observing());
        assert_eq!(hider.dom().observers.get(), 0);
        assert!(hider.selectors().is_empty());

        // Already hidden stays hidden, new arrivals are left alone
        let added = hider.dom().insert(None, &["ad-banner"]);
        assert_eq!(hider.on_added(&[added]), 0);
        assert_eq!(hider.dom().hidden_flags(), vec![true, false]);
    }

    #[test]
    fn test_no_hide_rules_never_observes() {
        let mut hider = PageHider::new(FakeDom::default());
        hider.refresh(&snapshot(vec![hide_rule(1, ".ad", true)]), "other.org");
        assert!(!hider.is_observing());
        assert_eq!(hider.dom().observers.get(), 0);
    }
}
