//! state.rs
//!
//! Workflow events, the reporter handle that emits them, and the
//! cooperative cancellation token.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
    Arc,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug)]
pub enum FlowEvent {
    Log(LogLevel, String),
    /// Overall workflow progress in percent, 0..=100.
    Progress(u8),
    /// Terminal event: the workflow's human-readable outcome.
    Finished(String),
}

/// Cheap cloneable handle used by every workflow step to emit events.
/// Sends never fail the step; a detached drain simply loses the line.
#[derive(Clone)]
pub struct Reporter {
    tx: Sender<FlowEvent>,
}

impl Reporter {
    pub fn new(tx: Sender<FlowEvent>) -> Self {
        Self { tx }
    }

    pub fn log(&self, level: LogLevel, msg: impl Into<String>) {
        let _ = self.tx.send(FlowEvent::Log(level, msg.into()));
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.log(LogLevel::Info, msg);
    }

    pub fn warn(&self, msg: impl Into<String>) {
        self.log(LogLevel::Warn, msg);
    }

    pub fn progress(&self, pct: u8) {
        let _ = self.tx.send(FlowEvent::Progress(pct.min(100)));
    }

    pub fn finished(&self, outcome: impl Into<String>) {
        let _ = self.tx.send(FlowEvent::Finished(outcome.into()));
    }
}

#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Shared flag, for wiring up signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn progress_is_clamped_to_100() {
        let (tx, rx) = mpsc::channel();
        let reporter = Reporter::new(tx);
        reporter.progress(250);

        match rx.recv().unwrap() {
            FlowEvent::Progress(pct) => assert_eq!(pct, 100),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn cancel_token_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
