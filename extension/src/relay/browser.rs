// Tab enumeration, script injection and tab messaging
// TabBrowser is the seam; ChromeTabs binds chrome.tabs / chrome.scripting

use async_trait::async_trait;
use serde_json::json;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::protocol::{Request, Response, TabId};
use crate::services::js::{error_message, from_js, to_js};

#[async_trait(?Send)]
pub trait TabBrowser {
    /// Active tab of the current window.
    async fn active_tab(&self) -> Option<TabId>;

    /// Whether the tab's readiness marker is set. Probe failures count as not ready.
    async fn probe_engine(&self, tab: TabId) -> bool;

    async fn inject_engine(&self, tab: TabId, script_file: &str) -> Result<(), String>;

    /// Deliver a request to the tab's content script. Errors carry the transport message.
    async fn send_to_tab(&self, tab: TabId, request: &Request) -> Result<Response, String>;
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
    fn tabs_query(query_info: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    fn tabs_send_message(tab_id: TabId, message: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "scripting"], js_name = executeScript)]
    fn execute_script(injection: &JsValue) -> Result<js_sys::Promise, JsValue>;
}

// Serialized by chrome.scripting and evaluated in the page's isolated world
#[wasm_bindgen(inline_js = "export function readinessProbe() { \
    return () => window.__aiBackgroundShifterReady === true; }")]
extern "C" {
    #[wasm_bindgen(js_name = readinessProbe)]
    fn readiness_probe() -> js_sys::Function;
}

async fn resolve(promise: Result<js_sys::Promise, JsValue>) -> Result<JsValue, String> {
    let promise = promise.map_err(|e| error_message(&e))?;
    JsFuture::from(promise).await.map_err(|e| error_message(&e))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ChromeTabs;

#[async_trait(?Send)]
impl TabBrowser for ChromeTabs {
    async fn active_tab(&self) -> Option<TabId> {
        let query = to_js(&json!({"active": true, "currentWindow": true})).ok()?;
        let tabs = match resolve(tabs_query(&query)).await {
            Ok(tabs) => tabs,
            Err(e) => {
                log::error!("Tab query failed: {}", e);
                return None;
            }
        };

        let first = js_sys::Array::from(&tabs).get(0);
        js_sys::Reflect::get(&first, &"id".into())
            .ok()
            .and_then(|id| id.as_f64())
            .map(|id| id as TabId)
    }

    async fn probe_engine(&self, tab: TabId) -> bool {
        let injection = js_sys::Object::new();
        let target = match to_js(&json!({"tabId": tab})) {
            Ok(target) => target,
            Err(_) => return false,
        };
        let _ = js_sys::Reflect::set(&injection, &"target".into(), &target);
        let _ = js_sys::Reflect::set(&injection, &"func".into(), &readiness_probe());

        match resolve(execute_script(&injection)).await {
            Ok(results) => {
                let first = js_sys::Array::from(&results).get(0);
                js_sys::Reflect::get(&first, &"result".into())
                    .ok()
                    .and_then(|r| r.as_bool())
                    .unwrap_or(false)
            }
            Err(e) => {
                log::debug!("Readiness probe failed for tab {}: {}", tab, e);
                false
            }
        }
    }

    async fn inject_engine(&self, tab: TabId, script_file: &str) -> Result<(), String> {
        let injection = to_js(&json!({"target": {"tabId": tab}, "files": [script_file]}))?;
        resolve(execute_script(&injection)).await.map(|_| ())
    }

    async fn send_to_tab(&self, tab: TabId, request: &Request) -> Result<Response, String> {
        let message = to_js(request)?;
        let reply = resolve(tabs_send_message(tab, &message)).await?;
        if reply.is_undefined() {
            return Err("The page did not send a response".to_string());
        }
        from_js(&reply)
    }
}
