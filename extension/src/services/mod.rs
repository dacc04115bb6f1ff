// Services behind the relay and the UI
// Timers, image generation, settings storage and runtime messaging

pub mod generator;
pub mod js;
pub mod messaging;
pub mod storage;
pub mod timer;

pub use generator::{ImageGenerator, MockImageGenerator};
pub use storage::{SettingsSource, SettingsStore};
pub use timer::{GlooTimer, Timer};
