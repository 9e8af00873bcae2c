//! Job-scoped cooperative cancellation.
//!
//! A [`CancelToken`] is cloned into every task and pipeline stage and checked
//! at suspension points. Setting it is advisory: in-flight external processes
//! are expected to be observed within one polling interval, not preempted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag for one job. Cheap to clone; all clones observe
/// the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
