// DOM access for the mutation engine
// PageDom is the seam; WebDom talks to the real page through web-sys

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use wasm_bindgen::JsCast;
use web_sys::{CssStyleDeclaration, Document, HtmlElement, Window};

use super::wrapper_scan::{LayoutBox, NodeId, Viewport};

/// Background properties captured before the first mutation and written back on restore.
/// The shorthand comes first so restoring it does not clobber the longhands.
pub const BACKGROUND_PROPERTIES: [&str; 7] = [
    "background",
    "background-color",
    "background-image",
    "background-size",
    "background-position",
    "background-repeat",
    "background-attachment",
];

/// Candidates for the full-bleed wrapper sweep.
const WRAPPER_SELECTOR: &str =
    "body div, body main, body section, body article, body header, body footer, body aside, body nav";

const CLEARED_ATTRIBUTE: &str = "data-ai-background-cleared";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageElement {
    Root,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("DOM operation failed: {0}")]
pub struct DomError(pub String);

/// Computed background properties of one element.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct BackgroundStyle(BTreeMap<String, String>);

impl BackgroundStyle {
    pub fn insert(&mut self, property: &str, value: String) {
        self.0.insert(property.to_string(), value);
    }

    /// Captured value, empty string when the property was not captured.
    pub fn get(&self, property: &str) -> &str {
        self.0.get(property).map(String::as_str).unwrap_or("")
    }
}

/// Pre-mutation state of both root and body.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct BackgroundSnapshot {
    pub root: BackgroundStyle,
    pub body: BackgroundStyle,
}

impl BackgroundSnapshot {
    pub fn capture(dom: &impl PageDom) -> Self {
        let read = |element| {
            let mut style = BackgroundStyle::default();
            for property in BACKGROUND_PROPERTIES {
                style.insert(property, dom.computed_style(element, property));
            }
            style
        };
        Self {
            root: read(PageElement::Root),
            body: read(PageElement::Body),
        }
    }

    pub fn style(&self, element: PageElement) -> &BackgroundStyle {
        match element {
            PageElement::Root => &self.root,
            PageElement::Body => &self.body,
        }
    }
}

pub trait PageDom {
    fn has_body(&self) -> bool;

    fn computed_style(&self, element: PageElement, property: &str) -> String;

    /// Set an inline style property; an empty value removes it.
    fn set_inline(
        &self,
        element: PageElement,
        property: &str,
        value: &str,
        important: bool,
    ) -> Result<(), DomError>;

    fn remove_inline(&self, element: PageElement, property: &str);

    /// Create the style element with `id` or replace its contents.
    fn upsert_style_element(&self, id: &str, css: &str) -> Result<(), DomError>;

    /// Returns whether an element was removed.
    fn remove_style_element(&self, id: &str) -> bool;

    fn viewport(&self) -> Viewport;

    /// Layout of wrapper candidates. `NodeId`s index into the latest snapshot.
    fn layout_boxes(&self) -> Vec<LayoutBox>;

    /// Force one element from the latest snapshot transparent via inline `!important`.
    fn force_transparent(&self, node: NodeId);

    /// Undo every `force_transparent`, returning how many elements were released.
    fn release_transparent(&self) -> usize;

    fn defer(&self, delay: Duration, task: Box<dyn FnOnce()>);
}

/// Element forced transparent, with the inline values it had before.
struct ClearedElement {
    element: HtmlElement,
    color: (String, String),
    image: (String, String),
}

struct WebDomInner {
    window: Window,
    document: Document,
    scanned: RefCell<Vec<HtmlElement>>,
    cleared: RefCell<Vec<ClearedElement>>,
}

/// `PageDom` over the live document of the content script's page.
#[derive(Clone)]
pub struct WebDom {
    inner: Rc<WebDomInner>,
}

impl WebDom {
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self {
            inner: Rc::new(WebDomInner {
                window,
                document,
                scanned: RefCell::new(Vec::new()),
                cleared: RefCell::new(Vec::new()),
            }),
        })
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    fn element(&self, element: PageElement) -> Option<HtmlElement> {
        match element {
            PageElement::Root => self
                .inner
                .document
                .document_element()
                .and_then(|el| el.dyn_into::<HtmlElement>().ok()),
            PageElement::Body => self.inner.document.body(),
        }
    }

    fn computed(&self, element: &HtmlElement) -> Option<CssStyleDeclaration> {
        self.inner.window.get_computed_style(element).ok().flatten()
    }
}

fn saved_property(style: &CssStyleDeclaration, property: &str) -> (String, String) {
    (
        style.get_property_value(property).unwrap_or_default(),
        style.get_property_priority(property),
    )
}

fn reinstate_property(style: &CssStyleDeclaration, property: &str, saved: &(String, String)) {
    let (value, priority) = saved;
    let result = if value.is_empty() {
        style.remove_property(property).map(|_| ())
    } else {
        style.set_property_with_priority(property, value, priority)
    };
    if let Err(e) = result {
        log::warn!("Failed to reinstate {}: {:?}", property, e);
    }
}

impl PageDom for WebDom {
    fn has_body(&self) -> bool {
        self.inner.document.body().is_some()
    }

    fn computed_style(&self, element: PageElement, property: &str) -> String {
        self.element(element)
            .and_then(|el| self.computed(&el))
            .and_then(|style| style.get_property_value(property).ok())
            .unwrap_or_default()
    }

    fn set_inline(
        &self,
        element: PageElement,
        property: &str,
        value: &str,
        important: bool,
    ) -> Result<(), DomError> {
        let el = self
            .element(element)
            .ok_or_else(|| DomError(format!("{:?} element is missing", element)))?;
        let priority = if important { "important" } else { "" };
        el.style()
            .set_property_with_priority(property, value, priority)
            .map_err(|e| DomError(format!("{}: {:?}", property, e)))
    }

    fn remove_inline(&self, element: PageElement, property: &str) {
        if let Some(el) = self.element(element) {
            let _ = el.style().remove_property(property);
        }
    }

    fn upsert_style_element(&self, id: &str, css: &str) -> Result<(), DomError> {
        let document = &self.inner.document;
        if let Some(existing) = document.get_element_by_id(id) {
            existing.set_text_content(Some(css));
            return Ok(());
        }

        let style = document
            .create_element("style")
            .map_err(|e| DomError(format!("create style: {:?}", e)))?;
        style.set_id(id);
        style.set_text_content(Some(css));

        let parent: web_sys::Node = match document.head() {
            Some(head) => head.into(),
            None => document
                .document_element()
                .ok_or_else(|| DomError("document has no root element".to_string()))?
                .into(),
        };
        parent
            .append_child(&style)
            .map_err(|e| DomError(format!("append style: {:?}", e)))?;
        Ok(())
    }

    fn remove_style_element(&self, id: &str) -> bool {
        match self.inner.document.get_element_by_id(id) {
            Some(el) => {
                el.remove();
                true
            }
            None => false,
        }
    }

    fn viewport(&self) -> Viewport {
        let dimension = |value: Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
        };
        Viewport {
            width: dimension(self.inner.window.inner_width()),
            height: dimension(self.inner.window.inner_height()),
        }
    }

    fn layout_boxes(&self) -> Vec<LayoutBox> {
        let mut scanned = self.inner.scanned.borrow_mut();
        scanned.clear();

        let nodes = match self.inner.document.query_selector_all(WRAPPER_SELECTOR) {
            Ok(nodes) => nodes,
            Err(e) => {
                log::warn!("Wrapper query failed: {:?}", e);
                return Vec::new();
            }
        };

        let mut boxes = Vec::with_capacity(nodes.length() as usize);
        for index in 0..nodes.length() {
            let Some(el) = nodes.item(index).and_then(|n| n.dyn_into::<HtmlElement>().ok()) else {
                continue;
            };
            let Some(style) = self.computed(&el) else {
                continue;
            };
            let rect = el.get_bounding_client_rect();

            boxes.push(LayoutBox {
                node: NodeId(scanned.len()),
                tag: el.tag_name(),
                display: style.get_property_value("display").unwrap_or_default(),
                width: rect.width(),
                height: rect.height(),
                background_color: style.get_property_value("background-color").unwrap_or_default(),
            });
            scanned.push(el);
        }
        boxes
    }

    fn force_transparent(&self, node: NodeId) {
        let Some(el) = self.inner.scanned.borrow().get(node.0).cloned() else {
            return;
        };
        if el.has_attribute(CLEARED_ATTRIBUTE) {
            return;
        }

        let style = el.style();
        let cleared = ClearedElement {
            color: saved_property(&style, "background-color"),
            image: saved_property(&style, "background-image"),
            element: el.clone(),
        };
        let _ = style.set_property_with_priority("background-color", "transparent", "important");
        let _ = style.set_property_with_priority("background-image", "none", "important");
        let _ = el.set_attribute(CLEARED_ATTRIBUTE, "");
        self.inner.cleared.borrow_mut().push(cleared);
    }

    fn release_transparent(&self) -> usize {
        let cleared = std::mem::take(&mut *self.inner.cleared.borrow_mut());
        for entry in &cleared {
            let style = entry.element.style();
            reinstate_property(&style, "background-color", &entry.color);
            reinstate_property(&style, "background-image", &entry.image);
            let _ = entry.element.remove_attribute(CLEARED_ATTRIBUTE);
        }
        cleared.len()
    }

    fn defer(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        gloo_timers::callback::Timeout::new(millis, task).forget();
    }
}
