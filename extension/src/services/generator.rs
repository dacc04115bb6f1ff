// Image generation
// Stubbed provider with fixed latency; real providers plug in behind ImageGenerator

use async_trait::async_trait;
use std::time::Duration;

use super::storage::SettingsSource;
use super::timer::Timer;
use crate::error::{Result, ShifterError};

#[async_trait(?Send)]
pub trait ImageGenerator {
    /// Image URL for a non-empty prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Placeholder images from picsum.photos, sized by the user's settings.
pub struct MockImageGenerator<T, S> {
    timer: T,
    settings: S,
    latency: Duration,
}

impl<T: Timer, S: SettingsSource> MockImageGenerator<T, S> {
    pub fn new(timer: T, settings: S, latency: Duration) -> Self {
        Self {
            timer,
            settings,
            latency,
        }
    }
}

#[async_trait(?Send)]
impl<T: Timer, S: SettingsSource> ImageGenerator for MockImageGenerator<T, S> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ShifterError::GenerationFailure(
                "Prompt must not be empty".to_string(),
            ));
        }

        let settings = self.settings.load().await;
        log::info!(
            "🖼️ Generating image for prompt {:?} (model: {}, size: {}, quality: {})",
            prompt,
            settings.ai_model,
            settings.image_size,
            settings.quality
        );

        self.timer.sleep(self.latency).await;

        let (width, height) = settings.image_dimensions();
        Ok(format!(
            "https://picsum.photos/{}/{}?random={}",
            width,
            height,
            self.timer.now_ms() as u64
        ))
    }
}
