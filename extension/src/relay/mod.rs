// Background relay
// Routes UI actions to the active tab's engine and proxies image generation

pub mod browser;
pub mod retry;

use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashSet;

use crate::config::RelayConfig;
use crate::error::{Result, ShifterError};
use crate::protocol::{MessageSender, Request, Responder, Response, TabId};
use crate::services::{ImageGenerator, Timer};

pub use browser::{ChromeTabs, TabBrowser};
pub use retry::{AttemptOutcome, ForwardAttempts};

/// Message router of the background service worker.
///
/// Flow for page actions:
/// 1. Resolve the active tab of the current window
/// 2. Probe for the engine's readiness marker, inject the content script if absent
/// 3. Forward the request, retrying while the page has no listener yet
///
/// All state lives on the service worker's single event loop, so interior
/// mutability through `RefCell` is enough.
pub struct Relay<B, G, T> {
    browser: B,
    generator: G,
    timer: T,
    config: RelayConfig,
    /// Tabs that announced `contentScriptReady`. Advisory only, never pruned.
    ready_tabs: RefCell<HashSet<TabId>>,
}

impl<B: TabBrowser, G: ImageGenerator, T: Timer> Relay<B, G, T> {
    pub fn new(browser: B, generator: G, timer: T, config: RelayConfig) -> Self {
        Self {
            browser,
            generator,
            timer,
            config,
            ready_tabs: RefCell::new(HashSet::new()),
        }
    }

    pub fn is_tab_ready(&self, tab: TabId) -> bool {
        self.ready_tabs.borrow().contains(&tab)
    }

    /// Decode a raw message, handle it and answer through `responder` exactly once.
    pub async fn dispatch(&self, message: Value, sender: MessageSender, responder: Responder) {
        let response = match Request::from_value(message) {
            Ok(request) => self.handle(request, &sender).await,
            Err(e) => {
                log::warn!("Rejected message: {}", e);
                Response::from(e)
            }
        };
        responder.send(response);
    }

    pub async fn handle(&self, request: Request, sender: &MessageSender) -> Response {
        log::debug!("Relay handling {}", request.action());
        match request {
            Request::ContentScriptReady => {
                if let Some(tab) = sender.tab_id() {
                    self.ready_tabs.borrow_mut().insert(tab);
                    log::info!("Content script ready in tab {}", tab);
                }
                Response::ok()
            }
            Request::GenerateImage { prompt } => {
                let result = self.generator.generate(&prompt).await;
                if let Err(e) = &result {
                    log::error!("❌ Image generation failed: {}", e);
                }
                result.map(Response::image).into()
            }
            page_request => {
                let result = self.forward_to_active_tab(&page_request).await;
                if let Err(e) = &result {
                    log::error!("❌ {} failed: {}", page_request.action(), e);
                }
                result.into()
            }
        }
    }

    async fn forward_to_active_tab(&self, request: &Request) -> Result<Response> {
        let tab = self
            .browser
            .active_tab()
            .await
            .ok_or(ShifterError::NoActiveTab)?;

        self.ensure_engine(tab).await?;
        self.send_with_retry(tab, request).await
    }

    /// Make sure the content script is listening in `tab`, injecting it once if needed.
    async fn ensure_engine(&self, tab: TabId) -> Result<()> {
        if self.browser.probe_engine(tab).await {
            return Ok(());
        }

        log::info!(
            "Engine not present in tab {} (announced ready: {}), injecting {}",
            tab,
            self.is_tab_ready(tab),
            self.config.content_script_file
        );
        self.browser
            .inject_engine(tab, &self.config.content_script_file)
            .await
            .map_err(ShifterError::InjectionFailed)?;

        self.timer.sleep(self.config.injection_settle()).await;

        if self.browser.probe_engine(tab).await {
            log::info!("✅ Engine injected into tab {}", tab);
            Ok(())
        } else {
            Err(ShifterError::InjectionFailed(
                "the content script did not report ready".to_string(),
            ))
        }
    }

    async fn send_with_retry(&self, tab: TabId, request: &Request) -> Result<Response> {
        let mut attempts = ForwardAttempts::new(&self.config);
        loop {
            let attempt = attempts.begin();
            match self.browser.send_to_tab(tab, request).await {
                Ok(response) => return Ok(response),
                Err(cause) => match attempts.record_failure(cause) {
                    AttemptOutcome::RetryAfter(backoff) => {
                        log::warn!(
                            "Attempt {}/{} to reach tab {} failed: {}",
                            attempt,
                            self.config.max_attempts,
                            tab,
                            attempts.last_error().unwrap_or_default()
                        );
                        self.timer.sleep(backoff).await;
                    }
                    AttemptOutcome::GiveUp(err) => return Err(err),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::services::MockImageGenerator;
    use crate::testing::{FakeBrowser, FakeTimer};
    use futures::executor::block_on;
    use serde_json::json;
    use std::rc::Rc;
    use std::time::Duration;

    const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";

    type TestRelay = Relay<FakeBrowser, MockImageGenerator<FakeTimer, Settings>, FakeTimer>;

    fn relay(browser: &FakeBrowser, timer: &FakeTimer) -> TestRelay {
        let config = RelayConfig::default();
        let generator =
            MockImageGenerator::new(timer.clone(), Settings::default(), config.generation_latency());
        Relay::new(browser.clone(), generator, timer.clone(), config)
    }

    fn dispatch(relay: &TestRelay, message: Value, sender: MessageSender) -> Vec<Response> {
        let replies = Rc::new(RefCell::new(Vec::new()));
        let sink = replies.clone();
        block_on(relay.dispatch(message, sender, Responder::new(move |r| sink.borrow_mut().push(r))));
        let replies = replies.borrow().clone();
        replies
    }

    #[test]
    fn test_info_on_fresh_page() {
        let browser = FakeBrowser::with_engine(1);
        let timer = FakeTimer::at(0.0);
        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "getBackgroundInfo"}),
            MessageSender::default(),
        );
        assert_eq!(
            serde_json::to_value(&replies).unwrap(),
            json!([{"success": true, "hasOriginal": false, "currentImage": null}])
        );
    }

    #[test]
    fn test_change_background_without_active_tab() {
        let browser = FakeBrowser::without_tabs();
        let timer = FakeTimer::at(0.0);
        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "changeBackground", "imageUrl": "https://x/y.png"}),
            MessageSender::default(),
        );
        assert_eq!(replies, vec![Response::failure("No active tab found")]);
        assert_eq!(browser.sent_count(), 0);
    }

    #[test]
    fn test_unknown_action() {
        let browser = FakeBrowser::with_engine(1);
        let timer = FakeTimer::at(0.0);
        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "foo"}),
            MessageSender::default(),
        );
        assert_eq!(replies, vec![Response::failure("Unknown action: foo")]);
    }

    #[test]
    fn test_change_background_reaches_engine() {
        let browser = FakeBrowser::with_engine(4);
        let timer = FakeTimer::at(0.0);
        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "changeBackground", "imageUrl": "https://x/y.png"}),
            MessageSender::default(),
        );
        assert_eq!(replies.len(), 1);
        assert!(replies[0].success);
        assert_eq!(
            browser.page_info().current_image.as_deref(),
            Some("https://x/y.png")
        );
        assert_eq!(browser.injections(), 0);
    }

    #[test]
    fn test_retry_bound_on_missing_receiver() {
        let browser = FakeBrowser::with_engine(1);
        browser.fail_sends_with(NO_RECEIVER, usize::MAX);
        let timer = FakeTimer::at(0.0);

        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "restoreBackground"}),
            MessageSender::default(),
        );

        assert_eq!(browser.sent_count(), 3);
        assert_eq!(
            replies,
            vec![Response::from(ShifterError::TransportFailure(NO_RECEIVER.to_string()))]
        );
        let backoff = RelayConfig::default().retry_backoff();
        assert_eq!(timer.sleeps(), vec![backoff, backoff]);
    }

    #[test]
    fn test_recovers_when_listener_appears() {
        let browser = FakeBrowser::with_engine(1);
        browser.fail_sends_with(NO_RECEIVER, 2);
        let timer = FakeTimer::at(0.0);

        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "getBackgroundInfo"}),
            MessageSender::default(),
        );
        assert_eq!(browser.sent_count(), 3);
        assert!(replies[0].success);
    }

    #[test]
    fn test_other_transport_failures_are_not_retried() {
        let browser = FakeBrowser::with_engine(1);
        browser.fail_sends_with("The message port closed before a response was received.", 1);
        let timer = FakeTimer::at(0.0);

        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "getBackgroundInfo"}),
            MessageSender::default(),
        );
        assert_eq!(browser.sent_count(), 1);
        assert!(!replies[0].success);
        assert!(replies[0].error.as_deref().unwrap().contains("reload the page"));
        assert!(timer.sleeps().is_empty());
    }

    #[test]
    fn test_injects_missing_engine_then_forwards() {
        let browser = FakeBrowser::without_engine(2);
        let timer = FakeTimer::at(0.0);

        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "getBackgroundInfo"}),
            MessageSender::default(),
        );
        assert!(replies[0].success);
        assert_eq!(browser.injections(), 1);
        assert_eq!(browser.injected_files(), vec!["content.js".to_string()]);
        assert_eq!(timer.sleeps(), vec![RelayConfig::default().injection_settle()]);
    }

    #[test]
    fn test_injection_that_never_loads_fails() {
        let browser = FakeBrowser::without_engine(2);
        browser.break_injection(None);
        let timer = FakeTimer::at(0.0);

        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "changeBackground", "imageUrl": "https://x/y.png"}),
            MessageSender::default(),
        );
        assert!(!replies[0].success);
        assert!(replies[0].error.as_deref().unwrap().contains("reload the page"));
        assert_eq!(browser.sent_count(), 0);
    }

    #[test]
    fn test_injection_error_is_surfaced() {
        let browser = FakeBrowser::without_engine(2);
        browser.break_injection(Some("Cannot access a chrome:// URL"));
        let timer = FakeTimer::at(0.0);

        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "restoreBackground"}),
            MessageSender::default(),
        );
        assert_eq!(
            replies,
            vec![Response::from(ShifterError::InjectionFailed(
                "Cannot access a chrome:// URL".to_string()
            ))]
        );
    }

    #[test]
    fn test_generate_image() {
        let browser = FakeBrowser::without_tabs();
        let timer = FakeTimer::at(42.0);
        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "generateImage", "prompt": "misty forest"}),
            MessageSender::default(),
        );
        assert_eq!(
            replies,
            vec![Response::image("https://picsum.photos/1792/1024?random=42")]
        );
        assert_eq!(timer.sleeps(), vec![Duration::from_millis(2000)]);
    }

    #[test]
    fn test_generation_failure_is_verbatim() {
        let browser = FakeBrowser::without_tabs();
        let timer = FakeTimer::at(0.0);
        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"action": "generateImage", "prompt": ""}),
            MessageSender::default(),
        );
        assert_eq!(replies, vec![Response::failure("Prompt must not be empty")]);
    }

    #[test]
    fn test_content_script_ready_is_recorded() {
        let browser = FakeBrowser::without_tabs();
        let timer = FakeTimer::at(0.0);
        let relay = relay(&browser, &timer);

        let replies = dispatch(
            &relay,
            json!({"action": "contentScriptReady"}),
            MessageSender::from_tab(9),
        );
        assert_eq!(replies, vec![Response::ok()]);
        assert!(relay.is_tab_ready(9));

        let replies = dispatch(&relay, json!({"action": "contentScriptReady"}), MessageSender::default());
        assert_eq!(replies, vec![Response::ok()]);
    }

    #[test]
    fn test_malformed_message_gets_one_reply() {
        let browser = FakeBrowser::with_engine(1);
        let timer = FakeTimer::at(0.0);
        let replies = dispatch(
            &relay(&browser, &timer),
            json!({"imageUrl": "https://x/y.png"}),
            MessageSender::default(),
        );
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].success);
    }
}
