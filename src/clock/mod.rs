//! Deferred callback scheduling.
//!
//! Every deadline in the guard goes through a [`Clock`], which offers the
//! current instant and a one-shot `after(delay, task)` primitive. Two
//! implementations exist:
//!
//! - [`TokioClock`]: real time, each task is a spawned tokio sleep
//! - [`MockClock`]: virtual time, advanced explicitly by tests and by the
//!   `simulate` command
//!
//! # Cancellation
//!
//! ```text
//! after() ──▶ TimerHandle ──cancel()──▶ flag set ──▶ task skipped
//!                                   └─▶ tokio task aborted (TokioClock)
//! ```
//!
//! A cancelled task never runs. A task that already started is not
//! interrupted; callers that need stronger guarantees compare a generation
//! counter inside the task.

mod mock;

pub use mock::MockClock;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Work executed when a timer fires.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Source of time and one-shot timers.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Runs `task` once `delay` has elapsed, unless the handle is cancelled first.
    fn after(&self, delay: Duration, task: Task) -> TimerHandle;
}

// ============================================================================
// TimerHandle
// ============================================================================

/// Cancellation token for a task scheduled with [`Clock::after`].
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    /// Creates a handle sharing `cancelled` with the scheduled task.
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            abort: None,
        }
    }

    /// Attaches the tokio task backing this timer.
    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Cancels the timer. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Returns true once [`TimerHandle::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// TokioClock
// ============================================================================

/// Real-time clock backed by the tokio timer wheel.
///
/// Must be used from within a tokio runtime. Under
/// `#[tokio::test(start_paused = true)]` it follows tokio's paused clock.
#[derive(Debug, Clone, Default)]
pub struct TokioClock;

impl TokioClock {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn after(&self, delay: Duration, task: Task) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });
        TimerHandle::new(cancelled).with_abort(join.abort_handle())
    }
}

// ============================================================================
// Tests
// ============================================================================
