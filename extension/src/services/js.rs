// JsValue <-> serde conversions through JSON
// Messages crossing chrome.* APIs are plain JSON objects

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::JsValue;

pub fn to_js<T: Serialize>(value: &T) -> Result<JsValue, String> {
    let json = serde_json::to_string(value).map_err(|e| format!("Serialization error: {}", e))?;
    js_sys::JSON::parse(&json).map_err(|e| format!("JSON parse error: {}", error_message(&e)))
}

pub fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, String> {
    let json = js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| JsValue::from(s).as_string())
        .ok_or_else(|| "Empty message".to_string())?;
    serde_json::from_str(&json).map_err(|e| format!("Parse error: {}", e))
}

/// Like `from_js`, but `undefined`/`null` (an omitted argument) is `None`.
pub fn from_js_optional<T: DeserializeOwned>(value: &JsValue) -> Result<Option<T>, String> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    from_js(value).map(Some)
}

/// `Error.message` of a rejected promise, or the value itself when it is a string.
pub fn error_message(error: &JsValue) -> String {
    if let Some(message) = error.as_string() {
        return message;
    }
    js_sys::Reflect::get(error, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}
