//! Virtual clock for deterministic timing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{Clock, Task, TimerHandle};

struct Pending {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: Task,
}

struct MockState {
    origin: Instant,
    elapsed: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// Clock whose time only moves when [`MockClock::advance`] is called.
///
/// Tasks fire in deadline order; ties fire in scheduling order. Tasks
/// scheduled while advancing run in the same call if they fall due before
/// the target time.
pub struct MockClock {
    state: Mutex<MockState>,
}

impl MockClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                next_seq: 0,
                pending: Vec::new(),
            }),
        }
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Number of scheduled tasks that are neither cancelled nor fired.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .pending
            .iter()
            .filter(|p| !p.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Time until the earliest live task falls due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        let state = self.state.lock();
        state
            .pending
            .iter()
            .filter(|p| !p.cancelled.load(Ordering::SeqCst))
            .map(|p| p.due.saturating_sub(state.elapsed))
            .min()
    }

    /// Moves virtual time forward by `by`, running every task that falls due.
    ///
    /// Returns the number of tasks that ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().elapsed.saturating_add(by);
        let mut fired = 0;

        loop {
            let next = {
                let mut state = self.state.lock();
                state
                    .pending
                    .retain(|p| !p.cancelled.load(Ordering::SeqCst));
                let due_index = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(index, _)| index);

                match due_index {
                    Some(index) => {
                        let pending = state.pending.swap_remove(index);
                        state.elapsed = state.elapsed.max(pending.due);
                        Some(pending)
                    }
                    None => {
                        state.elapsed = target;
                        None
                    }
                }
            };

            // The lock is released here: tasks may schedule more tasks.
            match next {
                Some(pending) => {
                    if !pending.cancelled.load(Ordering::SeqCst) {
                        (pending.task)();
                        fired += 1;
                    }
                }
                None => break,
            }
        }

        fired
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockClock")
            .field("elapsed", &state.elapsed)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let state = self.state.lock();
        state.origin + state.elapsed
    }

    fn after(&self, delay: Duration, task: Task) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.elapsed.saturating_add(delay);
        state.pending.push(Pending {
            due,
            seq,
            cancelled: cancelled.clone(),
            task,
        });
        TimerHandle::new(cancelled)
    }
}

// ============================================================================
// Tests
// ============================================================================
