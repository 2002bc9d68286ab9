//! Throttled activity reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::storage::SubscriptionId;

use super::{ActivityKind, ActivityListener, ActivitySource, ListenerId, ListenerPhase};

/// Callback invoked when (throttled) activity is reported.
pub type ActivityHandler = Arc<dyn Fn(ActivityKind) + Send + Sync>;

// ============================================================================
// Throttle
// ============================================================================

/// Lets a call through at most once per `interval`.
///
/// The first call always passes.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true and records `now` if at least `interval` passed since the
    /// last accepted call.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

// ============================================================================
// ActivityMonitor
// ============================================================================

/// Turns raw interaction events into rate-limited "activity occurred" reports.
///
/// One throttle is shared by every [`ActivityKind`], so a burst mixing pointer
/// moves and key presses still produces a single report per interval.
pub struct ActivityMonitor {
    clock: Arc<dyn Clock>,
    throttle: Mutex<Throttle>,
    handlers: Mutex<Vec<(SubscriptionId, ActivityHandler)>>,
    next_id: AtomicU64,
    attachment: Mutex<Option<Attachment>>,
}

struct Attachment {
    source: Arc<dyn ActivitySource>,
    listeners: Vec<ListenerId>,
}

impl ActivityMonitor {
    pub fn new(clock: Arc<dyn Clock>, throttle_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            clock,
            throttle: Mutex::new(Throttle::new(throttle_interval)),
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            attachment: Mutex::new(None),
        })
    }

    /// Registers capture-phase listeners for every [`ActivityKind`] on `source`.
    ///
    /// Attaching again first detaches from the previous source.
    pub fn attach(self: &Arc<Self>, source: Arc<dyn ActivitySource>) {
        self.detach();

        let listeners = ActivityKind::ALL
            .into_iter()
            .map(|kind| {
                let monitor: Weak<Self> = Arc::downgrade(self);
                let listener: ActivityListener = Arc::new(move |kind: ActivityKind| {
                    if let Some(monitor) = monitor.upgrade() {
                        monitor.on_activity(kind);
                    }
                });
                source.add_listener(kind, ListenerPhase::Capture, listener)
            })
            .collect();

        debug!(kinds = ActivityKind::ALL.len(), "activity listeners registered");
        *self.attachment.lock() = Some(Attachment { source, listeners });
    }

    /// Removes the listeners registered by [`ActivityMonitor::attach`].
    pub fn detach(&self) {
        if let Some(attachment) = self.attachment.lock().take() {
            for id in attachment.listeners {
                attachment.source.remove_listener(id);
            }
            debug!("activity listeners removed");
        }
    }

    /// Returns true while listeners are registered on a source.
    pub fn is_attached(&self) -> bool {
        self.attachment.lock().is_some()
    }

    /// Adds a handler called on every accepted activity report.
    pub fn subscribe(&self, handler: ActivityHandler) -> SubscriptionId {
        let id = SubscriptionId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().push((id, handler));
        id
    }

    /// Removes a handler. Returns false if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Reports one interaction event.
    ///
    /// Returns true if the throttle let it through and handlers ran.
    pub fn on_activity(&self, kind: ActivityKind) -> bool {
        let now = self.clock.now();
        if !self.throttle.lock().try_acquire(now) {
            trace!(%kind, "activity throttled");
            return false;
        }

        let handlers: Vec<ActivityHandler> =
            self.handlers.lock().iter().map(|(_, h)| h.clone()).collect();
        trace!(%kind, handlers = handlers.len(), "activity accepted");
        for handler in handlers {
            handler(kind);
        }
        true
    }
}

impl std::fmt::Debug for ActivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityMonitor")
            .field("throttle", &*self.throttle.lock())
            .field("handlers", &self.handlers.lock().len())
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
