// In-memory fakes for the DOM, chrome.tabs and timers

use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::engine::dom::{DomError, PageDom, PageElement};
use crate::engine::{LayoutBox, MutationEngine, NodeId, Viewport};
use crate::protocol::{BackgroundInfo, Request, Response, TabId};
use crate::relay::TabBrowser;
use crate::services::Timer;

type Deferred = (Duration, Box<dyn FnOnce()>);

#[derive(Default)]
struct DomState {
    has_body: bool,
    /// Stylesheet-derived values, what computed style falls back to
    base: HashMap<(PageElement, String), String>,
    inline: HashMap<(PageElement, String), (String, bool)>,
    style_elements: BTreeMap<String, String>,
    viewport: Option<Viewport>,
    boxes: Vec<LayoutBox>,
    forced: Vec<NodeId>,
    deferred: Vec<Deferred>,
    fail_inline_writes: bool,
    mutations: usize,
}

/// Page with a root and body whose computed style is inline-over-base.
#[derive(Clone, Default)]
pub struct FakeDom {
    state: Rc<RefCell<DomState>>,
}

impl FakeDom {
    /// White page, 1000x800 viewport, no wrappers.
    pub fn page() -> Self {
        let dom = Self::default();
        {
            let mut state = dom.state.borrow_mut();
            state.has_body = true;
            state.viewport = Some(Viewport {
                width: 1000.0,
                height: 800.0,
            });
            let base = [
                (PageElement::Root, "background-color", "rgba(0, 0, 0, 0)"),
                (PageElement::Root, "background-image", "none"),
                (PageElement::Root, "background-repeat", "repeat"),
                (PageElement::Body, "background-color", "rgb(255, 255, 255)"),
                (PageElement::Body, "background-image", "none"),
                (PageElement::Body, "background-attachment", "scroll"),
            ];
            for (element, property, value) in base {
                state
                    .base
                    .insert((element, property.to_string()), value.to_string());
            }
        }
        dom
    }

    pub fn remove_body(&self) {
        self.state.borrow_mut().has_body = false;
    }

    pub fn fail_inline_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_inline_writes = fail;
    }

    pub fn add_wrapper(&self, width: f64, height: f64, background_color: &str) {
        let mut state = self.state.borrow_mut();
        let node = NodeId(state.boxes.len());
        state.boxes.push(LayoutBox {
            node,
            tag: "DIV".to_string(),
            display: "block".to_string(),
            width,
            height,
            background_color: background_color.to_string(),
        });
    }

    pub fn inline(&self, element: PageElement, property: &str) -> Option<(String, bool)> {
        self.state
            .borrow()
            .inline
            .get(&(element, property.to_string()))
            .cloned()
    }

    pub fn style_element(&self, id: &str) -> Option<String> {
        self.state.borrow().style_elements.get(id).cloned()
    }

    pub fn style_element_count(&self) -> usize {
        self.state.borrow().style_elements.len()
    }

    pub fn forced(&self) -> Vec<NodeId> {
        self.state.borrow().forced.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.borrow().mutations
    }

    pub fn deferred_delays(&self) -> Vec<Duration> {
        self.state.borrow().deferred.iter().map(|(d, _)| *d).collect()
    }

    /// Run every deferred task as if its timer had fired.
    pub fn run_deferred(&self) {
        let tasks = std::mem::take(&mut self.state.borrow_mut().deferred);
        for (_, task) in tasks {
            task();
        }
    }
}

impl PageDom for FakeDom {
    fn has_body(&self) -> bool {
        self.state.borrow().has_body
    }

    fn computed_style(&self, element: PageElement, property: &str) -> String {
        let state = self.state.borrow();
        let key = (element, property.to_string());
        state
            .inline
            .get(&key)
            .map(|(value, _)| value.clone())
            .or_else(|| state.base.get(&key).cloned())
            .unwrap_or_default()
    }

    fn set_inline(
        &self,
        element: PageElement,
        property: &str,
        value: &str,
        important: bool,
    ) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        if state.fail_inline_writes {
            return Err(DomError(format!("{} is read-only", property)));
        }
        state.mutations += 1;
        let key = (element, property.to_string());
        if value.is_empty() {
            state.inline.remove(&key);
        } else {
            state.inline.insert(key, (value.to_string(), important));
        }
        Ok(())
    }

    fn remove_inline(&self, element: PageElement, property: &str) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        state.inline.remove(&(element, property.to_string()));
    }

    fn upsert_style_element(&self, id: &str, css: &str) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        state.style_elements.insert(id.to_string(), css.to_string());
        Ok(())
    }

    fn remove_style_element(&self, id: &str) -> bool {
        let mut state = self.state.borrow_mut();
        let removed = state.style_elements.remove(id).is_some();
        if removed {
            state.mutations += 1;
        }
        removed
    }

    fn viewport(&self) -> Viewport {
        self.state.borrow().viewport.unwrap_or(Viewport {
            width: 0.0,
            height: 0.0,
        })
    }

    fn layout_boxes(&self) -> Vec<LayoutBox> {
        self.state.borrow().boxes.clone()
    }

    fn force_transparent(&self, node: NodeId) {
        let mut state = self.state.borrow_mut();
        if !state.forced.contains(&node) {
            state.mutations += 1;
            state.forced.push(node);
        }
    }

    fn release_transparent(&self) -> usize {
        let mut state = self.state.borrow_mut();
        let released = std::mem::take(&mut state.forced).len();
        state.mutations += released;
        released
    }

    fn defer(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        self.state.borrow_mut().deferred.push((delay, task));
    }
}

#[derive(Default)]
struct TimerState {
    now_ms: f64,
    sleeps: Vec<Duration>,
}

/// Timer whose sleeps complete immediately and are recorded.
#[derive(Clone, Default)]
pub struct FakeTimer {
    state: Rc<RefCell<TimerState>>,
}

impl FakeTimer {
    pub fn at(now_ms: f64) -> Self {
        let timer = Self::default();
        timer.state.borrow_mut().now_ms = now_ms;
        timer
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.borrow().sleeps.clone()
    }
}

#[async_trait(?Send)]
impl Timer for FakeTimer {
    async fn sleep(&self, duration: Duration) {
        self.state.borrow_mut().sleeps.push(duration);
    }

    fn now_ms(&self) -> f64 {
        self.state.borrow().now_ms
    }
}

enum Injection {
    Loads,
    NeverReady,
    Fails(String),
}

struct BrowserState {
    active_tab: Option<TabId>,
    engine_loaded: bool,
    engine: MutationEngine<FakeDom>,
    injection: Injection,
    injected_files: Vec<String>,
    /// Failure message and how many sends still fail with it
    send_failure: Option<(String, usize)>,
    sent: usize,
}

/// One window with at most one tab, whose content script is a real engine over a `FakeDom`.
#[derive(Clone)]
pub struct FakeBrowser {
    state: Rc<RefCell<BrowserState>>,
}

impl FakeBrowser {
    fn build(active_tab: Option<TabId>, engine_loaded: bool) -> Self {
        let mut engine = MutationEngine::new(FakeDom::page(), EngineConfig::default());
        engine.mark_ready();
        Self {
            state: Rc::new(RefCell::new(BrowserState {
                active_tab,
                engine_loaded,
                engine,
                injection: Injection::Loads,
                injected_files: Vec::new(),
                send_failure: None,
                sent: 0,
            })),
        }
    }

    pub fn with_engine(tab: TabId) -> Self {
        Self::build(Some(tab), true)
    }

    pub fn without_engine(tab: TabId) -> Self {
        Self::build(Some(tab), false)
    }

    pub fn without_tabs() -> Self {
        Self::build(None, false)
    }

    pub fn fail_sends_with(&self, message: &str, times: usize) {
        self.state.borrow_mut().send_failure = Some((message.to_string(), times));
    }

    /// `None`: injection resolves but the engine never starts.
    pub fn break_injection(&self, error: Option<&str>) {
        self.state.borrow_mut().injection = match error {
            Some(e) => Injection::Fails(e.to_string()),
            None => Injection::NeverReady,
        };
    }

    pub fn sent_count(&self) -> usize {
        self.state.borrow().sent
    }

    pub fn injections(&self) -> usize {
        self.state.borrow().injected_files.len()
    }

    pub fn injected_files(&self) -> Vec<String> {
        self.state.borrow().injected_files.clone()
    }

    pub fn page_info(&self) -> BackgroundInfo {
        self.state.borrow().engine.info()
    }
}

#[async_trait(?Send)]
impl TabBrowser for FakeBrowser {
    async fn active_tab(&self) -> Option<TabId> {
        self.state.borrow().active_tab
    }

    async fn probe_engine(&self, tab: TabId) -> bool {
        let state = self.state.borrow();
        state.active_tab == Some(tab) && state.engine_loaded
    }

    async fn inject_engine(&self, _tab: TabId, script_file: &str) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        state.injected_files.push(script_file.to_string());
        let loads = match &state.injection {
            Injection::Loads => true,
            Injection::NeverReady => false,
            Injection::Fails(e) => return Err(e.clone()),
        };
        if loads {
            state.engine_loaded = true;
        }
        Ok(())
    }

    async fn send_to_tab(&self, _tab: TabId, request: &Request) -> Result<Response, String> {
        let mut state = self.state.borrow_mut();
        state.sent += 1;

        if let Some((message, remaining)) = state.send_failure.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(message.clone());
            }
        }

        Ok(state.engine.handle(request.clone()))
    }
}
