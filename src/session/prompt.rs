//! Warning prompt display surface.

use parking_lot::Mutex;

/// Renders the "session about to expire" countdown.
///
/// The guard treats the prompt as a sink: it never reads anything back.
/// Button presses are reported separately through
/// [`InactivityScheduler::handle_prompt_action`](super::InactivityScheduler::handle_prompt_action).
pub trait WarningPrompt: Send + Sync {
    /// Shows the prompt with `seconds` left on the countdown.
    fn show(&self, seconds: u64);

    /// Updates the displayed seconds.
    fn update(&self, seconds: u64);

    /// Hides the prompt.
    fn hide(&self);
}

/// Call recorded by [`MockPrompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptEvent {
    Shown(u64),
    Updated(u64),
    Hidden,
}

/// Mock prompt for testing.
#[derive(Debug, Default)]
pub struct MockPrompt {
    events: Mutex<Vec<PromptEvent>>,
}

impl MockPrompt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<PromptEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn show_count(&self) -> usize {
        self.count(|e| matches!(e, PromptEvent::Shown(_)))
    }

    #[must_use]
    pub fn hide_count(&self) -> usize {
        self.count(|e| matches!(e, PromptEvent::Hidden))
    }

    /// Seconds most recently shown or updated.
    #[must_use]
    pub fn last_seconds(&self) -> Option<u64> {
        self.events.lock().iter().rev().find_map(|e| match e {
            PromptEvent::Shown(s) | PromptEvent::Updated(s) => Some(*s),
            PromptEvent::Hidden => None,
        })
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    fn count(&self, predicate: impl Fn(&PromptEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl WarningPrompt for MockPrompt {
    fn show(&self, seconds: u64) {
        self.events.lock().push(PromptEvent::Shown(seconds));
    }

    fn update(&self, seconds: u64) {
        self.events.lock().push(PromptEvent::Updated(seconds));
    }

    fn hide(&self) {
        self.events.lock().push(PromptEvent::Hidden);
    }
}
