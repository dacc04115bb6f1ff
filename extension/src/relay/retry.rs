// Forwarding retry state machine
// Only "no receiving end" failures are retried, and attempts never overlap

use std::time::Duration;

use crate::config::RelayConfig;
use crate::error::ShifterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    RetryAfter(Duration),
    GiveUp(ShifterError),
}

#[derive(Debug, Clone)]
pub struct ForwardAttempts {
    max_attempts: u32,
    backoff: Duration,
    attempt: u32,
    last_error: Option<String>,
}

impl ForwardAttempts {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
            attempt: 0,
            last_error: None,
        }
    }

    /// Number the next send. Call once per send, after the previous failure was recorded.
    pub fn begin(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn record_failure(&mut self, cause: String) -> AttemptOutcome {
        let retryable = ShifterError::is_no_receiver(&cause);
        self.last_error = Some(cause.clone());

        if retryable && self.attempt < self.max_attempts {
            AttemptOutcome::RetryAfter(self.backoff)
        } else {
            AttemptOutcome::GiveUp(ShifterError::TransportFailure(cause))
        }
    }
}
