// chrome.runtime messaging for the side panel and the content script

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::js::{error_message, from_js, to_js};
use crate::protocol::{Request, Response};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = sendMessage)]
    fn runtime_send_message(message: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = openOptionsPage)]
    fn runtime_open_options_page() -> Result<js_sys::Promise, JsValue>;
}

/// Send a request to the background relay and wait for its single response.
pub async fn send_request(request: &Request) -> Result<Response, String> {
    log::debug!("Sending {} to background", request.action());
    let message = to_js(request)?;
    let promise = runtime_send_message(&message).map_err(|e| error_message(&e))?;
    let reply = JsFuture::from(promise).await.map_err(|e| error_message(&e))?;
    if reply.is_undefined() {
        return Err("No response from background".to_string());
    }
    from_js(&reply)
}

/// Open the extension's options page in a new tab.
pub async fn open_options_page() -> Result<(), String> {
    let promise = runtime_open_options_page().map_err(|e| error_message(&e))?;
    JsFuture::from(promise).await.map_err(|e| error_message(&e))?;
    Ok(())
}
