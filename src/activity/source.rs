//! Listener registration surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::ActivityKind;

/// Propagation phase a listener is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    /// Runs before any target or bubbling handler can stop propagation.
    Capture,
    /// Runs while the event bubbles up from its target.
    Bubble,
}

/// Callback attached to an [`ActivitySource`].
pub type ActivityListener = Arc<dyn Fn(ActivityKind) + Send + Sync>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Something that emits user interaction events (a document).
pub trait ActivitySource: Send + Sync {
    /// Registers `listener` for `kind` in the given phase.
    fn add_listener(
        &self,
        kind: ActivityKind,
        phase: ListenerPhase,
        listener: ActivityListener,
    ) -> ListenerId;

    /// Removes a listener. Returns false if it was unknown.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

struct Registration {
    id: ListenerId,
    kind: ActivityKind,
    phase: ListenerPhase,
    listener: ActivityListener,
}

/// In-process event target.
///
/// [`EventTarget::dispatch`] runs capture-phase listeners first, then
/// bubble-phase listeners, unless a bubble-phase stop is requested with
/// [`EventTarget::dispatch_stopped`].
#[derive(Default)]
pub struct EventTarget {
    registrations: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl EventTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an event of `kind` to every matching listener.
    pub fn dispatch(&self, kind: ActivityKind) {
        for listener in self.listeners_for(kind, ListenerPhase::Capture) {
            listener(kind);
        }
        for listener in self.listeners_for(kind, ListenerPhase::Bubble) {
            listener(kind);
        }
    }

    /// Delivers an event whose target handler stops propagation.
    ///
    /// Only capture-phase listeners observe it.
    pub fn dispatch_stopped(&self, kind: ActivityKind) {
        for listener in self.listeners_for(kind, ListenerPhase::Capture) {
            listener(kind);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Number of registered listeners for `kind` in `phase`.
    #[must_use]
    pub fn listener_count_for(&self, kind: ActivityKind, phase: ListenerPhase) -> usize {
        self.registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind && r.phase == phase)
            .count()
    }

    fn listeners_for(&self, kind: ActivityKind, phase: ListenerPhase) -> Vec<ActivityListener> {
        // Cloned out so listeners can add or remove registrations.
        self.registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind && r.phase == phase)
            .map(|r| r.listener.clone())
            .collect()
    }
}

impl std::fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ActivitySource for EventTarget {
    fn add_listener(
        &self,
        kind: ActivityKind,
        phase: ListenerPhase,
        listener: ActivityListener,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.registrations.lock().push(Registration {
            id,
            kind,
            phase,
            listener,
        });
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.lock();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }
}
