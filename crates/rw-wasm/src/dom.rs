//! `web_sys` implementation of the DOM surface used by the page hider.

use std::cell::RefCell;
use std::rc::Weak;

use rw_core::hider::{DomSurface, MutationSubscription, SelectorError, HIDDEN_MARKER};
use rw_core::PageHider;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, MutationObserver, MutationObserverInit, MutationRecord, NodeList};

type MutationCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

pub struct WebDom {
    document: Document,
    on_mutation: MutationCallback,
}

impl WebDom {
    pub fn new(document: Document, on_mutation: MutationCallback) -> Self {
        Self {
            document,
            on_mutation,
        }
    }
}

/// Build the observer callback. It holds only a weak handle so the hider
/// can own the subscription without a reference cycle.
pub fn mutation_callback(hider: Weak<RefCell<PageHider<WebDom>>>) -> MutationCallback {
    Closure::new(move |records: js_sys::Array, _observer: MutationObserver| {
        let Some(hider) = hider.upgrade() else {
            return;
        };

        let mut added = Vec::new();
        for record in records.iter() {
            let record: MutationRecord = record.unchecked_into();
            collect_elements(&record.added_nodes(), &mut added);
        }
        if added.is_empty() {
            return;
        }

        match hider.try_borrow_mut() {
            Ok(mut hider) => {
                hider.on_added(&added);
            }
            Err(_) => log::debug!("hider busy, skipping mutation batch"),
        };
    })
}

fn collect_elements(list: &NodeList, out: &mut Vec<Element>) {
    for i in 0..list.length() {
        if let Some(node) = list.item(i) {
            if let Ok(element) = node.dyn_into::<Element>() {
                out.push(element);
            }
        }
    }
}

fn selector_error(selector: &str, err: JsValue) -> SelectorError {
    let reason = err
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .unwrap_or_else(|| format!("{:?}", err));
    SelectorError {
        selector: selector.to_string(),
        reason,
    }
}

impl DomSurface for WebDom {
    type Element = Element;
    type Subscription = WebSubscription;

    fn query_selector_all(
        &self,
        scope: Option<&Element>,
        selector: &str,
    ) -> Result<Vec<Element>, SelectorError> {
        let list = match scope {
            Some(element) => element.query_selector_all(selector),
            None => self.document.query_selector_all(selector),
        }
        .map_err(|e| selector_error(selector, e))?;

        let mut elements = Vec::with_capacity(list.length() as usize);
        collect_elements(&list, &mut elements);
        Ok(elements)
    }

    fn matches(&self, element: &Element, selector: &str) -> Result<bool, SelectorError> {
        element.matches(selector).map_err(|e| selector_error(selector, e))
    }

    fn is_hidden(&self, element: &Element) -> bool {
        element.has_attribute(HIDDEN_MARKER)
    }

    fn hide(&self, element: &Element) {
        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            let _ = html
                .style()
                .set_property_with_priority("display", "none", "important");
        }
        let _ = element.set_attribute(HIDDEN_MARKER, "true");
    }

    fn observe(&self) -> WebSubscription {
        let observer = match MutationObserver::new(self.on_mutation.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(e) => {
                log::warn!("failed to create MutationObserver: {:?}", e);
                return WebSubscription { observer: None };
            }
        };

        let Some(root) = self.document.document_element() else {
            return WebSubscription { observer: None };
        };

        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        if let Err(e) = observer.observe_with_options(&root, &init) {
            log::warn!("failed to observe document: {:?}", e);
            return WebSubscription { observer: None };
        }

        WebSubscription {
            observer: Some(observer),
        }
    }
}

/// Owns a live `MutationObserver`; disconnects on `disconnect` or drop.
pub struct WebSubscription {
    observer: Option<MutationObserver>,
}

impl MutationSubscription for WebSubscription {
    fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
    }
}

impl Drop for WebSubscription {
    fn drop(&mut self) {
        self.disconnect();
    }
}
