use crate::config::SyncConfig;
use std::time::Duration;

/// What to do after a failed flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Flush again after `delay`. `attempt` counts retries for this batch,
    /// starting at 1.
    Retry { attempt: u32, delay: Duration },
    /// Automatic retries are exhausted. `attempts` counts every failed flush
    /// of the batch, including the first.
    GiveUp { attempts: u32 },
}

/// Bounded exponential backoff for batch flushes.
///
/// Consecutive failures schedule retries after the initial backoff, then
/// twice that, and so on, `max_retries` times. The next failure gives up and
/// resets, so a later unrelated failure starts a fresh sequence. Any success
/// resets as well.
#[derive(Debug, Clone)]
pub struct RetryController {
    max_retries: u32,
    initial_backoff: Duration,
    retry_count: u32,
    current_backoff: Duration,
}

impl RetryController {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            retry_count: 0,
            current_backoff: initial_backoff,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.max_retries, config.initial_backoff)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay the next retry would use.
    pub fn current_backoff(&self) -> Duration {
        self.current_backoff
    }

    pub fn is_idle(&self) -> bool {
        self.retry_count == 0
    }

    pub fn on_success(&mut self) {
        self.reset();
    }

    pub fn on_failure(&mut self) -> RetryDecision {
        if self.retry_count >= self.max_retries {
            let attempts = self.retry_count + 1;
            self.reset();
            return RetryDecision::GiveUp { attempts };
        }

        self.retry_count += 1;
        let delay = self.current_backoff;
        self.current_backoff = self.current_backoff.saturating_mul(2);
        RetryDecision::Retry {
            attempt: self.retry_count,
            delay,
        }
    }

    fn reset(&mut self) {
        self.retry_count = 0;
        self.current_backoff = self.initial_backoff;
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
