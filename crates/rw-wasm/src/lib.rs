//! WebAssembly bindings for ReWrite
//!
//! The extension's JS glue owns `chrome.storage`; it pushes the stored state
//! into this module with [`set_state`] and forwards `storage.onChanged` key
//! lists with [`notify_changed`]. Navigation and content-script hooks then
//! evaluate against the cached rules.

mod dom;
mod logger;

use std::cell::RefCell;
use std::rc::Rc;

use rw_core::manage::{self, DraftFields, RuleDraft};
use rw_core::navigation::RecordingSink;
use rw_core::store::install_defaults as seed_defaults;
use rw_core::{
    ChangedKeys, MemoryStore, NavigationHandler, NavigationOutcome, NavigationSink, PageHider,
    StoreError, StoredRule, StoredState,
};
use wasm_bindgen::prelude::*;

use crate::dom::{mutation_callback, WebDom};

thread_local! {
    static HANDLER: RefCell<NavigationHandler<MemoryStore>> =
        RefCell::new(NavigationHandler::new(MemoryStore::default()));
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    logger::init(log::LevelFilter::Info);
}

#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    logger::init(logger::parse_level(level));
}

// =============================================================================
// Store mirror
// =============================================================================

/// Replace the mirrored store with `state_json` (`{rules, enabled}`).
#[wasm_bindgen]
pub fn set_state(state_json: &str) -> Result<(), JsValue> {
    let state = StoredState::from_json(state_json).map_err(to_js)?;
    let changed = HANDLER.with(|handler| handler.borrow_mut().replace_state(state));
    log::debug!("state replaced, changed keys {:?}", changed);
    Ok(())
}

/// Forward the key names from `chrome.storage.onChanged`.
#[wasm_bindgen]
pub fn notify_changed(keys: js_sys::Array) {
    let names: Vec<String> = keys.iter().filter_map(|k| k.as_string()).collect();
    let changed = ChangedKeys::from_key_names(names.iter().map(String::as_str));
    HANDLER.with(|handler| handler.borrow_mut().on_storage_changed(changed));
}

/// Current mirrored state as JSON, for writing back to `chrome.storage`.
#[wasm_bindgen]
pub fn get_state() -> Result<String, JsValue> {
    HANDLER.with(|handler| handler.borrow().store().state().to_json_pretty().map_err(to_js))
}

fn mutate<T>(
    f: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
) -> Result<T, JsValue> {
    HANDLER.with(|handler| handler.borrow_mut().with_store(f).map_err(to_js))
}

/// Seed defaults on install. Returns the state JSON to persist, or `None`
/// when nothing was missing.
#[wasm_bindgen]
pub fn install_defaults(now_ms: f64) -> Result<Option<String>, JsValue> {
    let changed = mutate(|store| seed_defaults(store, now_ms as i64))?;
    if changed.is_empty() {
        return Ok(None);
    }
    get_state().map(Some)
}

// =============================================================================
// Rule management
// =============================================================================

fn parse_draft(draft_json: &str) -> Result<RuleDraft, JsValue> {
    let raw: StoredRule = serde_json::from_str(draft_json).map_err(to_js)?;
    let fields = DraftFields {
        parameter: raw.parameter.as_deref(),
        value: raw.value.as_deref(),
        from_path: raw.from_path.as_deref(),
        to_path: raw.to_path.as_deref(),
        selector: raw.selector.as_deref(),
    };
    RuleDraft::parse(&raw.domain, &raw.action, &fields).map_err(to_js)
}

#[wasm_bindgen]
pub fn add_rule(draft_json: &str, now_ms: f64) -> Result<String, JsValue> {
    let draft = parse_draft(draft_json)?;
    mutate(|store| manage::add_rule(store, draft, now_ms as i64))?;
    get_state()
}

#[wasm_bindgen]
pub fn edit_rule(id: f64, draft_json: &str) -> Result<String, JsValue> {
    let draft = parse_draft(draft_json)?;
    mutate(|store| manage::edit_rule(store, id as i64, draft))?;
    get_state()
}

#[wasm_bindgen]
pub fn toggle_rule(id: f64) -> Result<String, JsValue> {
    mutate(|store| manage::toggle_rule(store, id as i64))?;
    get_state()
}

#[wasm_bindgen]
pub fn delete_rule(id: f64) -> Result<String, JsValue> {
    mutate(|store| manage::delete_rule(store, id as i64))?;
    get_state()
}

#[wasm_bindgen]
pub fn set_enabled(enabled: bool) -> Result<String, JsValue> {
    mutate(|store| manage::set_enabled(store, enabled))?;
    get_state()
}

/// Rule summaries for the popup list, as a JS array of strings.
#[wasm_bindgen]
pub fn describe_rules() -> js_sys::Array {
    HANDLER.with(|handler| {
        let handler = handler.borrow();
        handler
            .store()
            .state()
            .rules()
            .iter()
            .map(|rule| JsValue::from_str(&manage::describe(rule)))
            .collect()
    })
}

// =============================================================================
// Navigation
// =============================================================================

/// Background hook for `webNavigation.onCommitted`. Returns the URL the tab
/// should be sent to, if any.
#[wasm_bindgen]
pub fn on_committed(url: &str, frame_id: i32) -> Result<Option<String>, JsValue> {
    let mut sink = RecordingSink::default();
    let outcome = HANDLER
        .with(|handler| handler.borrow_mut().on_committed(url, frame_id == 0, &mut sink))
        .map_err(to_js)?;

    Ok(match outcome {
        NavigationOutcome::Redirected(target) => Some(target),
        _ => None,
    })
}

struct LocationSink {
    location: web_sys::Location,
}

impl NavigationSink for LocationSink {
    fn replace_current_url(&mut self, url: &str) {
        if let Err(e) = self.location.replace(url) {
            log::warn!("location.replace failed: {:?}", e);
        }
    }
}

/// Content-script check: rewrites `window.location` in place if a rule fires.
#[wasm_bindgen]
pub fn check_location() -> Result<bool, JsValue> {
    let location = window()?.location();
    let href = location.href()?;
    let mut sink = LocationSink { location };

    let outcome = HANDLER
        .with(|handler| handler.borrow_mut().check_location(&href, &mut sink))
        .map_err(to_js)?;
    Ok(matches!(outcome, NavigationOutcome::Redirected(_)))
}

// =============================================================================
// Element hiding
// =============================================================================

/// Page-level hider. Call [`ContentHider::refresh`] after every
/// [`set_state`]/[`notify_changed`] so the selector set and the mutation
/// observer follow the rules.
#[wasm_bindgen]
pub struct ContentHider {
    inner: Rc<RefCell<PageHider<WebDom>>>,
}

#[wasm_bindgen]
impl ContentHider {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ContentHider, JsValue> {
        let document = window()?
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let inner = Rc::new_cyclic(|weak| {
            RefCell::new(PageHider::new(WebDom::new(document, mutation_callback(weak.clone()))))
        });
        Ok(ContentHider { inner })
    }

    /// Re-read rules and re-apply. Returns the number of newly hidden elements.
    pub fn refresh(&self) -> Result<usize, JsValue> {
        let host = window()?.location().hostname()?;
        HANDLER.with(|handler| {
            let mut handler = handler.borrow_mut();
            let snapshot = handler.snapshot().map_err(to_js)?;
            Ok(self.inner.borrow_mut().refresh(snapshot, &host))
        })
    }

    #[wasm_bindgen(getter)]
    pub fn observing(&self) -> bool {
        self.inner.borrow().is_observing()
    }

    #[wasm_bindgen(getter, js_name = hiddenCount)]
    pub fn hidden_count(&self) -> usize {
        self.inner.borrow().hidden_count()
    }

    pub fn stop(&self) {
        self.inner.borrow_mut().stop();
    }
}
