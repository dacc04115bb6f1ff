// Timer abstraction
// Retries and the mock generator wait on this instead of busy-waiting

use async_trait::async_trait;
use std::time::Duration;

#[async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);

    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> f64;
}

/// Browser timers via `setTimeout`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlooTimer;

#[async_trait(?Send)]
impl Timer for GlooTimer {
    async fn sleep(&self, duration: Duration) {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        gloo_timers::future::TimeoutFuture::new(millis).await;
    }

    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}
