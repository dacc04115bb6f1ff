// Extension configuration
// RelayConfig/EngineConfig tune timing; Settings is the user's persisted record

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{Result, ShifterError};

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// Total forwarding attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u32,
    /// Wait after injecting the content script before probing again
    #[serde(default = "default_injection_settle_ms")]
    pub injection_settle_ms: u32,
    #[serde(default = "default_generation_latency_ms")]
    pub generation_latency_ms: u32,
    #[serde(default = "default_content_script_file")]
    pub content_script_file: String,
}

impl RelayConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.into())
    }

    pub fn injection_settle(&self) -> Duration {
        Duration::from_millis(self.injection_settle_ms.into())
    }

    pub fn generation_latency(&self) -> Duration {
        Duration::from_millis(self.generation_latency_ms.into())
    }

    /// Defaults overlaid with the fields passed in by the extension glue, validated.
    pub fn from_overrides(overrides: Option<Value>) -> Result<Self> {
        let config: Self = overlay(overrides)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ShifterError::InvalidConfig(
                "relay max_attempts must be at least 1".to_string(),
            ));
        }
        if self.content_script_file.trim().is_empty() {
            return Err(ShifterError::InvalidConfig(
                "relay content_script_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            injection_settle_ms: default_injection_settle_ms(),
            generation_latency_ms: default_generation_latency_ms(),
            content_script_file: default_content_script_file(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u32 {
    500
}

fn default_injection_settle_ms() -> u32 {
    300
}

fn default_generation_latency_ms() -> u32 {
    2000
}

fn default_content_script_file() -> String {
    "content.js".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Second wrapper sweep, for content rendered after first paint
    #[serde(default = "default_rescan_delay_ms")]
    pub rescan_delay_ms: u32,
    #[serde(default = "default_min_width_ratio")]
    pub min_width_ratio: f64,
    #[serde(default = "default_min_height_ratio")]
    pub min_height_ratio: f64,
}

impl EngineConfig {
    pub fn rescan_delay(&self) -> Duration {
        Duration::from_millis(self.rescan_delay_ms.into())
    }

    pub fn from_overrides(overrides: Option<Value>) -> Result<Self> {
        let config: Self = overlay(overrides)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |ratio: f64| ratio > 0.0 && ratio <= 1.0;
        if !in_range(self.min_width_ratio) || !in_range(self.min_height_ratio) {
            return Err(ShifterError::InvalidConfig(
                "engine size ratios must be within (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

fn overlay<T: DeserializeOwned + Default>(overrides: Option<Value>) -> Result<T> {
    match overrides {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => {
            serde_json::from_value(value).map_err(|e| ShifterError::InvalidConfig(e.to_string()))
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rescan_delay_ms: default_rescan_delay_ms(),
            min_width_ratio: default_min_width_ratio(),
            min_height_ratio: default_min_height_ratio(),
        }
    }
}

fn default_rescan_delay_ms() -> u32 {
    1000
}

fn default_min_width_ratio() -> f64 {
    0.8
}

fn default_min_height_ratio() -> f64 {
    0.5
}

/// User settings stored under the `settings` key of `chrome.storage.sync`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub ai_model: String, // "dall-e-3", "dall-e-2", "stable-diffusion", "midjourney"
    pub api_key: String,
    pub image_size: String, // "1024x1024", "1792x1024", "1024x1792"
    pub quality: String,    // "standard" or "hd"
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ai_model: "dall-e-3".to_string(),
            api_key: String::new(),
            image_size: "1792x1024".to_string(),
            quality: "standard".to_string(),
        }
    }
}

impl Settings {
    /// Width and height parsed from `image_size`, default size if unparsable.
    pub fn image_dimensions(&self) -> (u32, u32) {
        self.image_size
            .split_once('x')
            .and_then(|(w, h)| Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?)))
            .filter(|&(w, h)| w > 0 && h > 0)
            .unwrap_or((1792, 1024))
    }
}
