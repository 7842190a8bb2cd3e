//! Apply context and callback traits
//!
//! These let the engine report progress and honor cancellation without
//! depending on a terminal, a signal handler, or any UI crate.

use crate::types::Phase;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default delay between provisioning polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(8);

/// Default upper bound on a provisioning wait
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30 * 60);

/// Cooperative cancellation flag, shared between clones
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running operations to stop at their next check
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bounds for the provisioning wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Delay before each poll
    pub poll_interval: Duration,
    /// Give up once this much time has passed
    pub max_wait: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// Progress callback for lifecycle operations
///
/// Implement this trait to receive progress updates. Calls may come from
/// several threads when entities are refreshed in parallel.
pub trait ProgressCallback: Send + Sync {
    /// Called when an entity moves from one phase to another
    fn on_phase(&self, id: &str, from: Phase, to: Phase);

    /// Called after each provisioning poll
    fn on_poll(&self, id: &str, attempt: u32, status: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase(&self, _id: &str, _from: Phase, _to: Phase) {}
    fn on_poll(&self, _id: &str, _attempt: u32, _status: &str) {}
}

/// Context passed to lifecycle operations
pub struct ApplyContext<'a> {
    pub wait: WaitOptions,
    pub cancel: CancelToken,
    pub progress: &'a dyn ProgressCallback,
}

impl<'a> ApplyContext<'a> {
    /// Create a context with default wait bounds and no progress reporting
    pub fn new() -> Self {
        Self {
            wait: WaitOptions::default(),
            cancel: CancelToken::new(),
            progress: &NoProgress,
        }
    }

    /// Create a context reporting to `progress`
    pub fn with_progress(wait: WaitOptions, progress: &'a dyn ProgressCallback) -> Self {
        Self {
            wait,
            cancel: CancelToken::new(),
            progress,
        }
    }

    /// Use a caller-owned cancel token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report and log a phase change
    pub fn transition(&self, id: &str, from: Phase, to: Phase) {
        if from != to {
            log::info!("{id}: {from} -> {to}");
            self.progress.on_phase(id, from, to);
        }
    }
}

impl Default for ApplyContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Phase, Phase)>>);

    impl ProgressCallback for Recorder {
        fn on_phase(&self, _id: &str, from: Phase, to: Phase) {
            self.0.lock().unwrap().push((from, to));
        }
        fn on_poll(&self, _id: &str, _attempt: u32, _status: &str) {}
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_wait_defaults() {
        let wait = WaitOptions::default();
        assert_eq!(wait.poll_interval, Duration::from_secs(8));
        assert_eq!(wait.max_wait, Duration::from_secs(1800));
    }

    #[test]
    fn test_transition_skips_no_op() {
        let recorder = Recorder::default();
        let ctx = ApplyContext::with_progress(WaitOptions::default(), &recorder);
        ctx.transition("c1", Phase::Ready, Phase::Ready);
        ctx.transition("c1", Phase::Ready, Phase::Updating);
        assert_eq!(*recorder.0.lock().unwrap(), vec![(Phase::Ready, Phase::Updating)]);
    }
}
