//! WebAssembly bindings for Cyber Guardian
//!
//! The extension's background and options scripts call these to validate
//! input and to build the exact `updateDynamicRules` payloads; the scripts
//! only shuttle values between the browser APIs and this module.

use serde::{de::DeserializeOwned, Serialize};
use wasm_bindgen::prelude::*;

use cg_core::{
    domain::{self, normalize, EMPTY_INPUT_MESSAGE, INVALID_INPUT_MESSAGE},
    page::{back_action, BackAction, BLOCKED_PAGE_PATH, SETTINGS_INSTRUCTIONS},
    pattern::to_match_pattern,
    rules::{base_rules, plan_base_update, plan_whitelist_update, whitelist_rules},
    store::whitelist_from_value,
};

// =============================================================================
// Initialization
// =============================================================================

/// Runs once when the module is instantiated: panics and `log` output go to
/// the browser console.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

// =============================================================================
// Domains
// =============================================================================

#[wasm_bindgen]
pub fn normalize_domain(raw: &str) -> String {
    normalize(raw)
}

#[wasm_bindgen]
pub fn is_valid_domain(domain: &str) -> bool {
    domain::is_valid(domain)
}

#[wasm_bindgen]
pub fn match_pattern(domain: &str) -> String {
    to_match_pattern(domain)
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct InputCheck {
    ok: bool,
    domain: String,
    message: Option<String>,
}

fn check_input(raw: &str) -> InputCheck {
    let domain = normalize(raw);
    let message = if domain.is_empty() {
        Some(EMPTY_INPUT_MESSAGE.to_string())
    } else if !domain::is_valid(&domain) {
        Some(INVALID_INPUT_MESSAGE.to_string())
    } else {
        None
    };
    InputCheck {
        ok: message.is_none(),
        domain,
        message,
    }
}

/// Validate options page input: `{ ok, domain, message }`.
#[wasm_bindgen]
pub fn validate_domain_input(raw: &str) -> Result<JsValue, JsValue> {
    to_js(&check_input(raw))
}

// =============================================================================
// Rules
// =============================================================================

#[wasm_bindgen]
pub fn base_rules_js() -> Result<JsValue, JsValue> {
    to_js(&base_rules())
}

#[wasm_bindgen]
pub fn whitelist_rules_js(whitelist: JsValue) -> Result<JsValue, JsValue> {
    to_js(&whitelist_rules(&whitelist_from_js(whitelist)?))
}

/// `{ addRules, removeRuleIds }` replacing the base tier.
#[wasm_bindgen]
pub fn plan_base_update_js(existing_ids: JsValue) -> Result<JsValue, JsValue> {
    to_js(&plan_base_update(&from_js::<Vec<i32>>(existing_ids)?))
}

/// `{ addRules, removeRuleIds }` replacing the whitelist tier.
#[wasm_bindgen]
pub fn plan_whitelist_update_js(existing_ids: JsValue, whitelist: JsValue) -> Result<JsValue, JsValue> {
    let ids: Vec<i32> = from_js(existing_ids)?;
    let whitelist = whitelist_from_js(whitelist)?;
    let (update, stats) = plan_whitelist_update(&ids, &whitelist);
    log::debug!(
        "Planned whitelist update: {} rules from {} entries",
        stats.rules,
        stats.entries
    );
    to_js(&update)
}

// =============================================================================
// Blocked Page
// =============================================================================

#[wasm_bindgen]
pub fn blocked_page_path() -> String {
    BLOCKED_PAGE_PATH.to_string()
}

/// URL to load for "go back", or `undefined` to step back in history.
#[wasm_bindgen]
pub fn back_target(history_len: u32) -> Option<String> {
    match back_action(history_len) {
        BackAction::History => None,
        BackAction::Navigate(url) => Some(url.to_string()),
    }
}

#[wasm_bindgen]
pub fn settings_instructions() -> String {
    SETTINGS_INSTRUCTIONS.to_string()
}

// =============================================================================
// Conversion
// =============================================================================

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&format!("Failed to serialize: {}", e)))
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid argument: {}", e)))
}

/// Whitelist as read from storage. Non-string elements are dropped with a
/// warning, the same as on the native storage path.
fn whitelist_from_js(value: JsValue) -> Result<Vec<String>, JsValue> {
    let value: serde_json::Value = from_js(value)?;
    Ok(whitelist_from_value(Some(value)))
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    fn js_array(items: &[JsValue]) -> JsValue {
        let array = js_sys::Array::new();
        for item in items {
            array.push(item);
        }
        array.into()
    }

    #[wasm_bindgen_test]
    fn plans_whitelist_update() {
        let ids = js_array(&[JsValue::from(1), JsValue::from(1000), JsValue::from(1001)]);
        let whitelist = js_array(&[JsValue::from_str("a.com")]);

        let update = plan_whitelist_update_js(ids, whitelist).unwrap();
        let remove = js_sys::Reflect::get(&update, &"removeRuleIds".into()).unwrap();
        let remove: Vec<f64> = js_sys::Array::from(&remove).iter().filter_map(|v| v.as_f64()).collect();
        assert_eq!(remove, vec![1000.0, 1001.0]);

        let add = js_sys::Reflect::get(&update, &"addRules".into()).unwrap();
        assert_eq!(js_sys::Array::from(&add).length(), 1);
    }

    #[wasm_bindgen_test]
    fn drops_non_string_entries() {
        let whitelist = js_array(&[JsValue::from(7), JsValue::from_str("a.com"), JsValue::NULL]);
        let rules = whitelist_rules_js(whitelist).unwrap();
        let rules = js_sys::Array::from(&rules);
        assert_eq!(rules.length(), 1);

        let id = js_sys::Reflect::get(&rules.get(0), &"id".into()).unwrap();
        assert_eq!(id.as_f64(), Some(1000.0));
    }

    #[wasm_bindgen_test]
    fn missing_whitelist_plans_teardown_only() {
        let ids = js_array(&[JsValue::from(1000)]);
        let update = plan_whitelist_update_js(ids, JsValue::UNDEFINED).unwrap();
        let add = js_sys::Reflect::get(&update, &"addRules".into()).unwrap();
        assert_eq!(js_sys::Array::from(&add).length(), 0);
    }

    #[wasm_bindgen_test]
    fn rejects_fractional_rule_ids() {
        let ids = js_array(&[JsValue::from(1.5)]);
        assert!(plan_base_update_js(ids).is_err());
    }

    #[wasm_bindgen_test]
    fn base_rules_are_objects() {
        let rules = base_rules_js().unwrap();
        assert_eq!(js_sys::Array::from(&rules).length(), 3);
    }
}
