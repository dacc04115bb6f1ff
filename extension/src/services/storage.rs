// Chrome Storage API Integration
// User settings live under the "settings" key of chrome.storage.sync

use async_trait::async_trait;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::js::{error_message, from_js, to_js};
use crate::config::Settings;

const SETTINGS_KEY: &str = "settings";

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"])]
    fn get(keys: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"])]
    fn set(items: JsValue) -> Result<js_sys::Promise, JsValue>;
}

/// Where the generator reads the current settings from.
#[async_trait(?Send)]
pub trait SettingsSource {
    async fn load(&self) -> Settings;
}

/// Fixed settings, used when nothing is persisted.
#[async_trait(?Send)]
impl SettingsSource for Settings {
    async fn load(&self) -> Settings {
        self.clone()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SettingsStore;

impl SettingsStore {
    pub fn new() -> Self {
        Self
    }

    /// Stored settings merged over defaults, `None` if nothing is stored yet.
    pub async fn read(&self) -> Result<Option<Settings>, String> {
        let keys = js_sys::Array::new();
        keys.push(&SETTINGS_KEY.into());

        let result = JsFuture::from(get(keys.into()).map_err(|e| error_message(&e))?)
            .await
            .map_err(|e| error_message(&e))?;

        let stored = js_sys::Reflect::get(&result, &SETTINGS_KEY.into())
            .map_err(|e| error_message(&e))?;
        if stored.is_undefined() || stored.is_null() {
            return Ok(None);
        }

        from_js(&stored).map(Some)
    }

    pub async fn write(&self, settings: &Settings) -> Result<(), String> {
        let obj = js_sys::Object::new();
        js_sys::Reflect::set(&obj, &SETTINGS_KEY.into(), &to_js(settings)?)
            .map_err(|e| error_message(&e))?;

        JsFuture::from(set(obj.into()).map_err(|e| error_message(&e))?)
            .await
            .map_err(|e| error_message(&e))?;
        log::info!("Settings saved");
        Ok(())
    }

    /// Persist defaults on first install. Returns whether anything was written.
    pub async fn seed_defaults(&self) -> Result<bool, String> {
        if self.read().await?.is_some() {
            return Ok(false);
        }
        self.write(&Settings::default()).await?;
        Ok(true)
    }
}

#[async_trait(?Send)]
impl SettingsSource for SettingsStore {
    async fn load(&self) -> Settings {
        match self.read().await {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                log::warn!("Failed to read settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }
}
