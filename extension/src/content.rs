// Content script for manipulating webpage backgrounds
// JavaScript glue calls init_content_script() once and routes onMessage to handle_message()

use std::cell::RefCell;

use ai_background_shifter::config::EngineConfig;
use ai_background_shifter::engine::{MutationEngine, WebDom};
use ai_background_shifter::protocol::{Request, Responder, Response};
use ai_background_shifter::services::js::{error_message, from_js, from_js_optional, to_js};
use ai_background_shifter::services::messaging::send_request;
use ai_background_shifter::ShifterError;
use wasm_bindgen::prelude::*;

// Dummy main for binary target
fn main() {}

/// Global read by the background's readiness probe
const READY_MARKER: &str = "__aiBackgroundShifterReady";

thread_local! {
    static ENGINE: RefCell<Option<MutationEngine<WebDom>>> = const { RefCell::new(None) };
}

fn set_ready_marker() {
    if let Some(window) = web_sys::window() {
        let _ = js_sys::Reflect::set(&window, &READY_MARKER.into(), &JsValue::TRUE);
    }
}

fn announce_ready() {
    set_ready_marker();

    wasm_bindgen_futures::spawn_local(async {
        match send_request(&Request::ContentScriptReady).await {
            Ok(_) => log::debug!("Announced readiness to background"),
            Err(e) => log::warn!("Failed to announce readiness: {}", e),
        }
    });
}

fn on_dom_ready() {
    ENGINE.with(|slot| {
        if let Some(engine) = slot.borrow_mut().as_mut() {
            engine.mark_ready();
        }
    });
    announce_ready();
}

/// Create this page's engine and mark it ready once the DOM is parsed.
///
/// `config` is an optional object of `EngineConfig` fields overriding the defaults.
#[wasm_bindgen]
pub fn init_content_script(config: JsValue) {
    if ENGINE.with(|slot| slot.borrow().is_some()) {
        log::debug!("Content script already initialized");
        return;
    }
    wasm_logger::init(wasm_logger::Config::default());

    let Some(dom) = WebDom::new() else {
        log::error!("No window/document available, content script disabled");
        return;
    };
    let config = from_js_optional::<serde_json::Value>(&config)
        .map_err(ShifterError::InvalidConfig)
        .and_then(EngineConfig::from_overrides)
        .unwrap_or_else(|e| {
            log::error!("{}, using defaults", e);
            EngineConfig::default()
        });

    let document = dom.document().clone();
    let mut engine = MutationEngine::new(dom, config);
    let ready = engine.ready_if_parsed(&document.ready_state());

    ENGINE.with(|slot| *slot.borrow_mut() = Some(engine));
    log::info!("AI Background Shifter content script loaded");

    if ready {
        announce_ready();
        return;
    }

    let callback = Closure::once_into_js(on_dom_ready);
    if let Err(e) =
        document.add_event_listener_with_callback("DOMContentLoaded", callback.unchecked_ref())
    {
        log::error!("Failed to wait for DOMContentLoaded: {}", error_message(&e));
    }
}

/// Handle a chrome.runtime.onMessage event; the response is sent synchronously.
#[wasm_bindgen]
pub fn handle_message(message: JsValue, send_response: js_sys::Function) -> bool {
    let responder = Responder::new(move |response| {
        let reply = to_js(&response).unwrap_or_else(|e| JsValue::from_str(&e));
        if let Err(e) = send_response.call1(&JsValue::NULL, &reply) {
            log::error!("sendResponse failed: {}", error_message(&e));
        }
    });

    let request = from_js::<serde_json::Value>(&message)
        .map_err(ShifterError::MalformedRequest)
        .and_then(Request::from_value);

    let response = match request {
        Ok(request) => ENGINE.with(|slot| match slot.borrow_mut().as_mut() {
            Some(engine) => engine.handle(request),
            None => Response::from(ShifterError::NotReady),
        }),
        Err(e) => Response::from(e),
    };
    responder.send(response);

    false
}
