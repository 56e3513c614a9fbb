use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation signals shared between a running pipeline and its callers.
///
/// `stop` is latched until the next [`reset`](Self::reset). `skip` is
/// consumed by the first checkpoint that observes it.
#[derive(Debug, Default)]
pub struct RunContext {
    stop: AtomicBool,
    skip: AtomicBool,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears both signals. Called at the start of every run.
    pub fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.skip.store(false, Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn request_skip(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Returns whether a skip was pending, clearing it.
    pub fn take_skip(&self) -> bool {
        self.skip.swap(false, Ordering::SeqCst)
    }

    pub fn skip_pending(&self) -> bool {
        self.skip.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_latched() {
        let context = RunContext::new();
        context.request_stop();
        assert!(context.stop_requested());
        assert!(context.stop_requested());
    }

    #[test]
    fn test_skip_is_consumed_once() {
        let context = RunContext::new();
        context.request_skip();
        assert!(context.skip_pending());
        assert!(context.take_skip());
        assert!(!context.take_skip());
        assert!(!context.skip_pending());
    }

    #[test]
    fn test_reset_clears_both() {
        let context = RunContext::new();
        context.request_stop();
        context.request_skip();
        context.reset();
        assert!(!context.stop_requested());
        assert!(!context.skip_pending());
    }
}
