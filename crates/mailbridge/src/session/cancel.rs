use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run-level cancellation signal shared by the caller and every worker.
/// Checked between candidates; a write in progress finishes its current step.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
