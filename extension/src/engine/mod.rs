// Background mutation engine (content-script side)
// One instance per page: applies a generated background and restores the original

pub mod dom;
pub mod stylesheet;
pub mod wrapper_scan;

use std::cell::Cell;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::error::{Result, ShifterError};
use crate::protocol::{BackgroundInfo, Request, Response};

pub use dom::{BackgroundSnapshot, PageDom, PageElement, WebDom, BACKGROUND_PROPERTIES};
pub use stylesheet::STYLE_ELEMENT_ID;
pub use wrapper_scan::{find_occluding_wrappers, LayoutBox, NodeId, Viewport};

/// Inline fallback on the root element, in case page rules outrank the injected sheet.
const ROOT_INLINE: [(&str, &str); 4] = [
    ("background-size", "cover"),
    ("background-position", "center center"),
    ("background-repeat", "no-repeat"),
    ("background-attachment", "fixed"),
];

const BODY_INLINE: [(&str, &str); 2] = [
    ("background-color", "transparent"),
    ("background-image", "none"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
}

/// Per-page background state, owned by exactly one engine.
#[derive(Debug, Default)]
pub struct PageBackgroundState {
    original: Option<BackgroundSnapshot>,
    current_image: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// Restore ran but had to clear inline properties instead of writing the snapshot back
    Cleared,
    NothingToRestore,
}

pub struct MutationEngine<D: PageDom> {
    dom: D,
    config: EngineConfig,
    state: EngineState,
    page: PageBackgroundState,
    /// Bumped on every apply and restore so stale delayed sweeps do nothing
    epoch: Rc<Cell<u64>>,
}

impl<D: PageDom + Clone + 'static> MutationEngine<D> {
    pub fn new(dom: D, config: EngineConfig) -> Self {
        Self {
            dom,
            config,
            state: EngineState::Uninitialized,
            page: PageBackgroundState::default(),
            epoch: Rc::new(Cell::new(0)),
        }
    }

    pub fn mark_ready(&mut self) {
        if self.state == EngineState::Uninitialized {
            log::info!("🎨 Background engine ready");
        }
        self.state = EngineState::Ready;
    }

    /// Ready right away unless the document is still `loading`; returns whether it became ready.
    pub fn ready_if_parsed(&mut self, document_ready_state: &str) -> bool {
        if document_ready_state == "loading" {
            return false;
        }
        self.mark_ready();
        true
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    pub fn info(&self) -> BackgroundInfo {
        BackgroundInfo {
            has_original: self.page.original.is_some(),
            current_image: self.page.current_image.clone(),
        }
    }

    pub fn apply_background(&mut self, image_url: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(ShifterError::NotReady);
        }
        if image_url.trim().is_empty() {
            return Err(ShifterError::MalformedRequest(
                "imageUrl must not be empty".to_string(),
            ));
        }
        if !self.dom.has_body() {
            return Err(ShifterError::DocumentNotReady);
        }

        if self.page.original.is_none() {
            self.page.original = Some(BackgroundSnapshot::capture(&self.dom));
            log::debug!("Captured original background");
        }

        let css = stylesheet::build_stylesheet(image_url);
        if let Err(e) = self.dom.upsert_style_element(STYLE_ELEMENT_ID, &css) {
            log::warn!("Stylesheet injection failed, relying on inline styles: {}", e);
        }

        let force_inline = |element: PageElement, property: &str, value: &str| {
            if let Err(e) = self.dom.set_inline(element, property, value, true) {
                log::warn!("Inline {:?} fallback failed: {}", element, e);
            }
        };
        force_inline(
            PageElement::Root,
            "background-image",
            &stylesheet::css_url(image_url),
        );
        for (property, value) in ROOT_INLINE {
            force_inline(PageElement::Root, property, value);
        }
        for (property, value) in BODY_INLINE {
            force_inline(PageElement::Body, property, value);
        }

        self.epoch.set(self.epoch.get() + 1);
        let cleared = sweep_wrappers(&self.dom, &self.config);
        log::debug!("Initial wrapper sweep cleared {} element(s)", cleared);
        self.schedule_rescan();

        self.page.current_image = Some(image_url.to_string());
        log::info!("✅ Background changed to: {}", image_url);
        Ok(())
    }

    fn schedule_rescan(&self) {
        let dom = self.dom.clone();
        let config = self.config.clone();
        let epoch = self.epoch.clone();
        let scheduled_at = epoch.get();

        self.dom.defer(
            self.config.rescan_delay(),
            Box::new(move || {
                if epoch.get() != scheduled_at {
                    return;
                }
                let cleared = sweep_wrappers(&dom, &config);
                log::debug!("Delayed wrapper sweep cleared {} element(s)", cleared);
            }),
        );
    }

    pub fn restore_background(&mut self) -> Result<RestoreOutcome> {
        if !self.is_ready() {
            return Err(ShifterError::NotReady);
        }
        let Some(original) = self.page.original.take() else {
            log::info!("No original background stored, nothing to restore");
            return Ok(RestoreOutcome::NothingToRestore);
        };

        self.epoch.set(self.epoch.get() + 1);
        self.dom.remove_style_element(STYLE_ELEMENT_ID);
        let released = self.dom.release_transparent();
        log::debug!("Released {} wrapper element(s)", released);

        let outcome = match self.write_back(&original) {
            Ok(()) => RestoreOutcome::Restored,
            Err(e) => {
                log::warn!("Restoring snapshot failed ({}), clearing inline backgrounds", e);
                self.clear_inline_backgrounds();
                RestoreOutcome::Cleared
            }
        };

        self.page.current_image = None;
        log::info!("↩️ Background restored to original");
        Ok(outcome)
    }

    fn write_back(&self, original: &BackgroundSnapshot) -> std::result::Result<(), dom::DomError> {
        for element in [PageElement::Root, PageElement::Body] {
            let style = original.style(element);
            for property in BACKGROUND_PROPERTIES {
                self.dom.set_inline(element, property, style.get(property), false)?;
            }
        }
        Ok(())
    }

    fn clear_inline_backgrounds(&self) {
        for element in [PageElement::Root, PageElement::Body] {
            for property in BACKGROUND_PROPERTIES {
                self.dom.remove_inline(element, property);
            }
        }
    }

    /// Serve one request routed to this page.
    pub fn handle(&mut self, request: Request) -> Response {
        log::debug!("Engine received {}", request.action());
        let result = match request {
            Request::ChangeBackground { image_url } => self
                .apply_background(&image_url)
                .map(|()| Response::message("Background changed successfully")),
            Request::RestoreBackground => self.restore_background().map(|outcome| match outcome {
                RestoreOutcome::NothingToRestore => Response::message("No background changes to restore"),
                _ => Response::message("Background restored successfully"),
            }),
            Request::GetBackgroundInfo => Ok(Response::info(self.info())),
            other => Err(ShifterError::UnknownAction(other.action().to_string())),
        };

        if let Err(e) = &result {
            log::error!("❌ {}", e);
        }
        result.into()
    }
}

/// Force every occluding wrapper currently on the page transparent.
pub fn sweep_wrappers(dom: &impl PageDom, config: &EngineConfig) -> usize {
    let boxes = dom.layout_boxes();
    let wrappers = find_occluding_wrappers(&boxes, dom.viewport(), config);
    for node in &wrappers {
        dom.force_transparent(*node);
    }
    wrappers.len()
}
