use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::FunctionError;

/// Progress reported by a running function.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

/// Channel a function writes progress updates into.
pub type ProgressSink = UnboundedSender<ProgressUpdate>;

/// Per-invocation environment.
///
/// Carries the deadline, a cancellation flag the dispatcher can raise from
/// another thread, and an optional progress sink (present only for streamed
/// calls).
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
    progress: Option<ProgressSink>,
}

/// Raises cancellation on the context it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl InvocationContext {
    /// A context with no deadline and no progress sink.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancelled.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns `Err(Cancelled)` once the call was cancelled or its deadline
    /// passed. Long-running functions call this between units of work.
    pub fn checkpoint(&self) -> Result<(), FunctionError> {
        if self.is_cancelled() {
            Err(FunctionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Whether anyone is listening for progress.
    pub fn wants_progress(&self) -> bool {
        self.progress.as_ref().is_some_and(|sink| !sink.is_closed())
    }

    /// Sends a progress update; a no-op without a sink or after the
    /// listener went away.
    pub fn report_progress(&self, progress: f64, total: Option<f64>, message: Option<String>) {
        if let Some(sink) = &self.progress {
            let _ = sink.send(ProgressUpdate {
                progress,
                total,
                message,
            });
        }
    }
}
