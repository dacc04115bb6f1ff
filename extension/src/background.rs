// Background service worker for AI Background Shifter
// JavaScript glue forwards chrome.* events to the exports below

use std::cell::RefCell;
use std::rc::Rc;

use ai_background_shifter::config::RelayConfig;
use ai_background_shifter::protocol::{MessageSender, Responder};
use ai_background_shifter::relay::{ChromeTabs, Relay};
use ai_background_shifter::ShifterError;
use ai_background_shifter::services::js::{error_message, from_js, from_js_optional, to_js};
use ai_background_shifter::services::{GlooTimer, MockImageGenerator, SettingsStore};
use serde_json::json;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

// Dummy main for binary target
fn main() {}

type BackgroundRelay = Relay<ChromeTabs, MockImageGenerator<GlooTimer, SettingsStore>, GlooTimer>;

thread_local! {
    static RELAY: RefCell<Option<Rc<BackgroundRelay>>> = const { RefCell::new(None) };
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "sidePanel"], js_name = open)]
    fn side_panel_open(options: &JsValue) -> Result<js_sys::Promise, JsValue>;
}

fn build_relay(config: RelayConfig) -> Rc<BackgroundRelay> {
    let generator = MockImageGenerator::new(
        GlooTimer,
        SettingsStore::new(),
        config.generation_latency(),
    );
    Rc::new(Relay::new(ChromeTabs, generator, GlooTimer, config))
}

fn relay() -> Rc<BackgroundRelay> {
    RELAY.with(|slot| {
        slot.borrow_mut()
            .get_or_insert_with(|| build_relay(RelayConfig::default()))
            .clone()
    })
}

/// Initialize background service worker.
///
/// `config` is an optional object of `RelayConfig` fields overriding the defaults.
#[wasm_bindgen]
pub fn init_background(config: JsValue) {
    wasm_logger::init(wasm_logger::Config::default());

    let config = from_js_optional::<serde_json::Value>(&config)
        .map_err(ShifterError::InvalidConfig)
        .and_then(RelayConfig::from_overrides)
        .unwrap_or_else(|e| {
            log::error!("{}, using defaults", e);
            RelayConfig::default()
        });
    log::debug!("Relay config: {:?}", config);

    RELAY.with(|slot| *slot.borrow_mut() = Some(build_relay(config)));
    log::info!("🚀 AI Background Shifter background service initialized");
}

/// Handle extension icon click: open the side panel for that tab
#[wasm_bindgen]
pub fn handle_icon_click(tab_id: i32) {
    log::info!("Extension icon clicked (tab: {})", tab_id);

    let options = match to_js(&json!({"tabId": tab_id})) {
        Ok(options) => options,
        Err(e) => {
            log::error!("Failed to build side panel options: {}", e);
            return;
        }
    };
    match side_panel_open(&options) {
        Ok(promise) => wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                log::error!("Failed to open side panel: {}", error_message(&e));
            }
        }),
        Err(e) => log::error!("Failed to open side panel: {}", error_message(&e)),
    }
}

/// Handle extension installation: seed default settings
#[wasm_bindgen]
pub fn handle_install() {
    log::info!("Extension installed or updated");
    wasm_bindgen_futures::spawn_local(async {
        match SettingsStore::new().seed_defaults().await {
            Ok(true) => log::info!("Default settings stored"),
            Ok(false) => {}
            Err(e) => log::warn!("Failed to seed settings: {}", e),
        }
    });
}

/// Handle a chrome.runtime.onMessage event.
///
/// Always returns `true`: the channel stays open until `send_response` has been
/// called, which happens exactly once.
#[wasm_bindgen]
pub fn handle_message(message: JsValue, sender: JsValue, send_response: js_sys::Function) -> bool {
    let responder = Responder::new(move |response| {
        let reply = to_js(&response).unwrap_or_else(|e| JsValue::from_str(&e));
        if let Err(e) = send_response.call1(&JsValue::NULL, &reply) {
            log::error!("sendResponse failed: {}", error_message(&e));
        }
    });

    let sender: MessageSender = from_js(&sender).unwrap_or_default();
    let relay = relay();

    match from_js::<serde_json::Value>(&message) {
        Ok(message) => wasm_bindgen_futures::spawn_local(async move {
            relay.dispatch(message, sender, responder).await;
        }),
        Err(e) => {
            log::warn!("Undecodable message: {}", e);
            responder.send(ShifterError::MalformedRequest(e).into());
        }
    }

    true
}
