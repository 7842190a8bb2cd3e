//! Retry logic with exponential backoff for transient errors.
//!
//! Only reads go through here. Create, patch, terminate and key issuance
//! are not idempotent and are called exactly once.

use cloudapi::{Error, Result};
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted backoff sleep when a stop condition is given.
const SLICE: Duration = Duration::from_millis(50);

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of another attempt.
    ///
    /// `attempt` is the 1-indexed attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration);
}

/// Callback that logs each retry at `warn`.
pub struct LogRetry<'a> {
    pub what: &'a str,
}

impl RetryCallback for LogRetry<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration) {
        log::warn!(
            "{} attempt {attempt}/{max_attempts} failed: {error}. Retrying in {}ms",
            self.what,
            delay.as_millis()
        );
    }
}

/// Execute an operation with retry logic.
///
/// Retries while the operation returns a retryable error and attempts
/// remain; any other error is returned at once.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    with_retry_until(config, callback, || false, operation)
}

/// Like [`with_retry`], but gives up as soon as `stop` returns true.
///
/// `stop` is checked before each retry and while backing off, so a
/// cancelled or expired caller gets the last error back without sitting
/// out the remaining delay. A request already in flight is not interrupted.
pub fn with_retry_until<T, F, S>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    stop: S,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
    S: Fn() -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, max_attempts, &e, delay);
                }
                if !backoff(delay, &stop) {
                    log::debug!("Giving up after attempt {}: stopped during backoff", attempt + 1);
                    return Err(e);
                }
                attempt += 1;
            }
        }
    }
}

/// Sleep for `delay` in slices; false if `stop` fired first.
fn backoff(delay: Duration, stop: &impl Fn() -> bool) -> bool {
    let wake = Instant::now().checked_add(delay);
    loop {
        if stop() {
            return false;
        }
        let now = Instant::now();
        let left = wake.map_or(SLICE, |wake| wake.saturating_duration_since(now));
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(SLICE));
    }
}
