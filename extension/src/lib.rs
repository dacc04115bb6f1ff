//! AI Background Shifter: generate an image from a prompt and use it as a page's background.
//!
//! Three browser contexts share this crate:
//! - the background service worker runs the [`relay::Relay`] (`src/background.rs`)
//! - the content script runs one [`engine::MutationEngine`] per page (`src/content.rs`)
//! - the side panel UI is launched from [`launch_side_panel`] (feature `ui`)

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod services;

#[cfg(feature = "ui")]
mod components;
#[cfg(feature = "ui")]
pub mod icons;

#[cfg(test)]
mod testing;

pub use error::{Result, ShifterError};

/// Start the side panel. Called from the panel page's JavaScript glue.
#[cfg(feature = "ui")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn launch_side_panel() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("AI Background Shifter side panel starting...");
    dioxus::launch(components::SidePanel);
}
