//! Inactivity deadlines and the warning countdown.
//!
//! Two independent one-shot timers are kept per arm:
//!
//! ```text
//! arm() ─┬─ warning  @ now + max(limit - lead, 1s) ──▶ show prompt (if hidden)
//!        │                                              └─▶ 1s countdown ticks
//!        └─ logout   @ now + limit ────────────────────▶ terminate session
//! ```
//!
//! The countdown is display-only; the logout deadline alone ends the
//! session. Every arm bumps a generation counter and each timer callback
//! carries the generation it was scheduled under, so a callback that was
//! already in flight when a newer arm happened does nothing.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::clock::{Clock, TimerHandle};
use crate::types::{GuardConfig, GuardState, GuardStatus, PromptAction};

use super::{SessionTerminator, WarningPrompt};

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

// ============================================================================
// TimerState
// ============================================================================

/// Mutable timer bookkeeping owned by one [`InactivityScheduler`].
#[derive(Debug, Default)]
pub struct TimerState {
    /// When the current window started
    pub last_activity_at: Option<Instant>,
    /// Whether the warning prompt is on screen
    pub warning_visible: bool,
    /// Seconds currently displayed by the countdown
    pub countdown_remaining: i64,
    /// Bumped on every arm
    pub generation: u64,
    /// Set once the session has ended; arm() is a no-op afterwards
    pub terminated: bool,
    warning: Option<TimerHandle>,
    logout: Option<TimerHandle>,
    countdown: Option<TimerHandle>,
    warning_at: Option<Instant>,
    logout_at: Option<Instant>,
}

impl TimerState {
    fn cancel_timers(&mut self) {
        for handle in [
            self.warning.take(),
            self.logout.take(),
            self.countdown.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.cancel();
        }
        self.warning_at = None;
        self.logout_at = None;
    }

    fn is_live(handle: &Option<TimerHandle>) -> bool {
        handle.as_ref().is_some_and(|h| !h.is_cancelled())
    }
}

// ============================================================================
// InactivityScheduler
// ============================================================================

struct Inner {
    config: GuardConfig,
    clock: Arc<dyn Clock>,
    prompt: Arc<dyn WarningPrompt>,
    terminator: Arc<SessionTerminator>,
    state: Mutex<TimerState>,
}

/// Owns the warning and logout deadlines of one page.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct InactivityScheduler {
    inner: Arc<Inner>,
}

/// Non-owning reference to an [`InactivityScheduler`].
#[derive(Clone)]
pub struct WeakScheduler(Weak<Inner>);

impl WeakScheduler {
    pub fn upgrade(&self) -> Option<InactivityScheduler> {
        self.0.upgrade().map(|inner| InactivityScheduler { inner })
    }
}

impl InactivityScheduler {
    pub fn new(
        config: GuardConfig,
        clock: Arc<dyn Clock>,
        prompt: Arc<dyn WarningPrompt>,
        terminator: Arc<SessionTerminator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                prompt,
                terminator,
                state: Mutex::new(TimerState::default()),
            }),
        }
    }

    /// Returns a reference that does not keep the scheduler alive.
    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler(Arc::downgrade(&self.inner))
    }

    /// Starts a fresh inactivity window.
    ///
    /// Cancels the previous warning, logout and countdown timers, hides a
    /// visible prompt and schedules a new deadline pair. Does nothing once
    /// the session has ended.
    pub fn arm(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if state.terminated {
            debug!("arm ignored: session already terminated");
            return;
        }

        state.cancel_timers();
        if state.warning_visible {
            state.warning_visible = false;
            inner.prompt.hide();
        }

        state.generation += 1;
        let generation = state.generation;
        let now = inner.clock.now();
        let limit = inner.config.inactivity_limit;
        let warning_delay = inner.config.warning_delay();

        // Logout first: on equal deadlines it must win over the warning.
        state.logout = Some(schedule(inner, limit, generation, Inner::on_logout_deadline));
        state.warning = Some(schedule(
            inner,
            warning_delay,
            generation,
            Inner::on_warning_deadline,
        ));
        state.last_activity_at = Some(now);
        // Deadlines past the end of `Instant` are still scheduled, just not reported.
        state.logout_at = now.checked_add(limit);
        state.warning_at = now.checked_add(warning_delay);

        debug!(
            generation,
            logout_in_ms = limit.as_millis() as u64,
            warning_in_ms = warning_delay.as_millis() as u64,
            "inactivity timers armed"
        );
    }

    /// Reacts to a button of the warning prompt.
    pub fn handle_prompt_action(&self, action: PromptAction) {
        info!(action = ?action, "warning prompt action");
        match action {
            PromptAction::StaySignedIn => self.arm(),
            PromptAction::SignOutNow => self.inner.terminate("user request"),
        }
    }

    /// Ends the session now, as if the logout deadline had fired.
    pub fn logout_now(&self) {
        self.inner.terminate("forced");
    }

    /// Stops every timer and hides the prompt without running the terminator.
    ///
    /// Used when the page goes away or another tab already logged out.
    /// Returns false if the session had already ended.
    pub fn halt(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.terminated {
            return false;
        }
        state.terminated = true;
        state.cancel_timers();
        if state.warning_visible {
            state.warning_visible = false;
            self.inner.prompt.hide();
        }
        debug!("inactivity timers halted");
        true
    }

    /// Returns true while the warning prompt is shown.
    pub fn is_warning_visible(&self) -> bool {
        self.inner.state.lock().warning_visible
    }

    /// Returns true once the session has ended.
    pub fn is_terminated(&self) -> bool {
        self.inner.state.lock().terminated
    }

    /// Number of live deadline timers (warning and logout).
    ///
    /// Never exceeds two.
    pub fn live_timer_count(&self) -> usize {
        let state = self.inner.state.lock();
        [&state.warning, &state.logout]
            .into_iter()
            .filter(|h| TimerState::is_live(h))
            .count()
    }

    /// Returns true while the countdown tick is scheduled.
    pub fn is_counting_down(&self) -> bool {
        TimerState::is_live(&self.inner.state.lock().countdown)
    }

    /// When the current inactivity window started.
    pub fn last_activity_at(&self) -> Option<Instant> {
        self.inner.state.lock().last_activity_at
    }

    /// Arm generation; increases by one per effective [`InactivityScheduler::arm`].
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Snapshot for display.
    pub fn status(&self) -> GuardStatus {
        let now = self.inner.clock.now();
        let state = self.inner.state.lock();
        let until = |at: Option<Instant>, handle: &Option<TimerHandle>| {
            if TimerState::is_live(handle) {
                at.map(|at| at.saturating_duration_since(now).as_millis() as u64)
            } else {
                None
            }
        };

        let phase = if state.terminated {
            GuardState::Terminated
        } else if state.warning_visible {
            GuardState::Warning
        } else {
            GuardState::Watching
        };

        GuardStatus {
            state: phase,
            countdown_remaining: state
                .warning_visible
                .then_some(state.countdown_remaining.max(0)),
            warning_in_ms: until(state.warning_at, &state.warning),
            logout_in_ms: until(state.logout_at, &state.logout),
        }
    }

    /// The configuration this scheduler runs with.
    pub fn config(&self) -> &GuardConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for InactivityScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InactivityScheduler")
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

/// Schedules `fire(inner, generation)` after `delay`.
fn schedule(
    inner: &Arc<Inner>,
    delay: Duration,
    generation: u64,
    fire: fn(&Arc<Inner>, u64),
) -> TimerHandle {
    let weak = Arc::downgrade(inner);
    inner.clock.after(
        delay,
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                fire(&inner, generation);
            }
        }),
    )
}

impl Inner {
    fn on_warning_deadline(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        if state.terminated || state.generation != generation {
            return;
        }
        state.warning = None;
        state.warning_at = None;
        if state.warning_visible {
            debug!("warning already visible, not showing again");
            return;
        }

        let seconds = self.config.countdown_seconds();
        state.warning_visible = true;
        state.countdown_remaining = seconds as i64;
        self.prompt.show(seconds);
        state.countdown = Some(schedule(
            self,
            COUNTDOWN_TICK,
            generation,
            Inner::on_countdown_tick,
        ));
        info!(seconds, "inactivity warning shown");
    }

    fn on_countdown_tick(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        if state.terminated || state.generation != generation || !state.warning_visible {
            return;
        }

        state.countdown_remaining -= 1;
        if state.countdown_remaining < 0 {
            // Logout belongs to the logout deadline, not to the countdown.
            state.countdown = None;
            return;
        }
        self.prompt.update(state.countdown_remaining as u64);
        state.countdown = Some(schedule(
            self,
            COUNTDOWN_TICK,
            generation,
            Inner::on_countdown_tick,
        ));
    }

    fn on_logout_deadline(self: &Arc<Self>, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.logout = None;
        }
        self.terminate("inactivity limit reached");
    }

    fn terminate(&self, reason: &str) {
        {
            let mut state = self.state.lock();
            if state.terminated {
                debug!(reason, "logout ignored: session already terminated");
                return;
            }
            state.terminated = true;
            state.cancel_timers();
            if state.warning_visible {
                state.warning_visible = false;
                self.prompt.hide();
            }
        }

        info!(reason, "logging out");
        // Lock released: the terminator talks to storage and other tabs.
        self.terminator.logout();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::session::{CrossTabNotifier, MockNavigator, MockPrompt, PromptEvent};
    use crate::storage::{ChannelHub, KeyValueStore, MemoryStore};

    const MINUTE: Duration = Duration::from_secs(60);

    struct Harness {
        scheduler: InactivityScheduler,
        clock: Arc<MockClock>,
        prompt: Arc<MockPrompt>,
        navigator: Arc<MockNavigator>,
        shared: Arc<MemoryStore>,
    }

    fn harness(config: GuardConfig) -> Harness {
        let clock = Arc::new(MockClock::new());
        let prompt = Arc::new(MockPrompt::new());
        let navigator = Arc::new(MockNavigator::new());
        let shared = Arc::new(MemoryStore::with_entries([("authToken", "jwt")]));
        let hub = ChannelHub::new(shared.clone());
        let notifier = Arc::new(CrossTabNotifier::new(
            Arc::new(hub.open_tab()),
            config.logout_channel_key.clone(),
            config.login_path.clone(),
            navigator.clone(),
        ));
        let terminator = Arc::new(SessionTerminator::new(
            notifier,
            shared.clone(),
            Arc::new(MemoryStore::new()),
            navigator.clone(),
            config.credential_key.clone(),
            config.login_path.clone(),
        ));
        let scheduler =
            InactivityScheduler::new(config, clock.clone(), prompt.clone(), terminator);
        Harness {
            scheduler,
            clock,
            prompt,
            navigator,
            shared,
        }
    }

    mod arm_tests {
        use super::*;

        #[test]
        fn test_arm_schedules_one_pair() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            assert_eq!(h.scheduler.live_timer_count(), 2);
            assert_eq!(h.clock.pending_count(), 2);
            assert_eq!(h.scheduler.generation(), 1);
        }

        #[test]
        fn test_repeated_arm_does_not_accumulate_timers() {
            let h = harness(GuardConfig::default());
            for _ in 0..100 {
                h.scheduler.arm();
            }
            assert_eq!(h.scheduler.live_timer_count(), 2);
            assert_eq!(h.clock.pending_count(), 2);
            assert_eq!(h.scheduler.generation(), 100);
        }

        #[test]
        fn test_rearm_pushes_deadline_back() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();

            // Activity every 30 minutes for 5 hours
            for _ in 0..10 {
                h.clock.advance(30 * MINUTE);
                h.scheduler.arm();
            }
            assert_eq!(h.navigator.visit_count(), 0);
            assert_eq!(h.prompt.show_count(), 0);
            assert!(!h.scheduler.is_terminated());
        }

        #[test]
        fn test_arm_records_last_activity() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            let first = h.scheduler.last_activity_at().unwrap();

            h.clock.advance(MINUTE);
            h.scheduler.arm();
            assert_eq!(h.scheduler.last_activity_at().unwrap() - first, MINUTE);
        }

        #[test]
        fn test_arm_after_termination_is_noop() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            h.scheduler.logout_now();
            h.scheduler.arm();

            assert_eq!(h.scheduler.live_timer_count(), 0);
            assert_eq!(h.clock.pending_count(), 0);
            assert_eq!(h.navigator.visit_count(), 1);
        }

        #[test]
        fn test_arm_with_limit_past_instant_range() {
            let h = harness(
                GuardConfig::default().with_inactivity_limit(Duration::from_secs(u64::MAX / 2)),
            );
            h.scheduler.arm();
            assert_eq!(h.scheduler.live_timer_count(), 2);
            assert_eq!(h.scheduler.status().logout_in_ms, None);

            h.clock.advance(24 * 60 * MINUTE);
            h.scheduler.arm();
            assert_eq!(h.prompt.show_count(), 0);
            assert_eq!(h.navigator.visit_count(), 0);
        }
    }

    mod warning_tests {
        use super::*;

        #[test]
        fn test_warning_appears_at_limit_minus_lead() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();

            h.clock.advance(44 * MINUTE - Duration::from_millis(1));
            assert_eq!(h.prompt.show_count(), 0);

            h.clock.advance(Duration::from_millis(1));
            assert_eq!(h.prompt.events(), vec![PromptEvent::Shown(60)]);
            assert!(h.scheduler.is_warning_visible());
            assert_eq!(h.scheduler.live_timer_count(), 1);
        }

        #[test]
        fn test_countdown_ticks_and_stops_without_logging_out() {
            // Lead longer than the countdown window so the countdown can run out
            let config = GuardConfig::default()
                .with_inactivity_limit(10 * MINUTE)
                .with_warning_lead_time(Duration::from_secs(3));
            let h = harness(config);
            h.scheduler.arm();

            h.clock.advance(10 * MINUTE - Duration::from_secs(3));
            assert_eq!(h.prompt.last_seconds(), Some(3));

            h.clock.advance(Duration::from_secs(1));
            assert_eq!(h.prompt.last_seconds(), Some(2));
            h.clock.advance(Duration::from_secs(1));
            assert_eq!(h.prompt.last_seconds(), Some(1));
            assert!(h.scheduler.is_counting_down());
            assert_eq!(h.navigator.visit_count(), 0);

            // Logout deadline (t = limit) fires before the countdown reaches zero
            h.clock.advance(Duration::from_secs(1));
            assert_eq!(h.navigator.visit_count(), 1);
            assert!(!h.scheduler.is_counting_down());
        }

        #[test]
        fn test_clamped_warning_still_logs_out_at_limit() {
            // Lead longer than the limit: warning after 1s with a 5s countdown
            let config = GuardConfig::default()
                .with_inactivity_limit(Duration::from_secs(2))
                .with_warning_lead_time(Duration::from_secs(5));
            let h = harness(config);
            h.scheduler.arm();

            h.clock.advance(Duration::from_secs(1));
            assert_eq!(h.prompt.events(), vec![PromptEvent::Shown(5)]);
            h.clock.advance(Duration::from_secs(1));
            assert_eq!(h.navigator.visit_count(), 1);
            assert_eq!(h.scheduler.status().state, GuardState::Terminated);
        }

        #[test]
        fn test_countdown_stops_below_zero() {
            let config = GuardConfig::default()
                .with_inactivity_limit(10 * MINUTE)
                .with_warning_lead_time(Duration::from_secs(3));
            let h = harness(config);
            h.scheduler.arm();
            h.clock.advance(10 * MINUTE - Duration::from_secs(3));
            assert!(h.scheduler.is_counting_down());

            h.scheduler.inner.state.lock().countdown_remaining = 0;
            h.prompt.clear_events();
            let generation = h.scheduler.generation();
            h.scheduler.inner.on_countdown_tick(generation);

            assert!(h.prompt.events().is_empty());
            assert!(!h.scheduler.is_counting_down());
            assert!(!h.scheduler.is_terminated());
            assert_eq!(h.scheduler.status().countdown_remaining, Some(0));
        }

        #[test]
        fn test_zero_lead_logout_wins_tie() {
            let config = GuardConfig::default()
                .with_inactivity_limit(MINUTE)
                .with_warning_lead_time(Duration::ZERO);
            let h = harness(config);
            h.scheduler.arm();

            h.clock.advance(MINUTE - Duration::from_millis(1));
            assert_eq!(h.prompt.show_count(), 0);
            h.clock.advance(Duration::from_millis(1));
            // Both deadlines coincide; the logout was scheduled first
            assert_eq!(h.navigator.visit_count(), 1);
            assert_eq!(h.prompt.show_count(), 0);
        }

        #[test]
        fn test_stay_signed_in_hides_and_restarts_window() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            h.clock.advance(44 * MINUTE + Duration::from_secs(10));
            assert!(h.scheduler.is_warning_visible());

            h.scheduler.handle_prompt_action(PromptAction::StaySignedIn);
            assert!(!h.scheduler.is_warning_visible());
            assert!(!h.scheduler.is_counting_down());
            assert_eq!(h.prompt.hide_count(), 1);

            // The old deadline (50s away) must not fire
            h.clock.advance(MINUTE);
            assert_eq!(h.navigator.visit_count(), 0);

            // New warning 44 minutes after the click
            h.clock.advance(43 * MINUTE - Duration::from_millis(1));
            assert_eq!(h.prompt.show_count(), 1);
            h.clock.advance(Duration::from_millis(1));
            assert_eq!(h.prompt.show_count(), 2);

            h.clock.advance(MINUTE);
            assert_eq!(h.navigator.visit_count(), 1);
        }

        #[test]
        fn test_sign_out_now() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            h.clock.advance(44 * MINUTE);

            h.scheduler.handle_prompt_action(PromptAction::SignOutNow);
            assert_eq!(h.navigator.visits(), vec!["login.html"]);
            assert!(!h.scheduler.is_warning_visible());
            assert_eq!(h.clock.pending_count(), 0);

            // The pending logout deadline was cancelled
            h.clock.advance(10 * MINUTE);
            assert_eq!(h.navigator.visit_count(), 1);
        }

        #[test]
        fn test_stale_warning_callback_is_ignored() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            let stale_generation = h.scheduler.generation();
            h.scheduler.arm();

            // Simulate a callback that escaped cancellation
            h.scheduler.inner.on_warning_deadline(stale_generation);
            h.scheduler.inner.on_logout_deadline(stale_generation);
            assert_eq!(h.prompt.show_count(), 0);
            assert_eq!(h.navigator.visit_count(), 0);
        }

        #[test]
        fn test_warning_never_shown_twice_without_arm() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            h.clock.advance(44 * MINUTE);
            let generation = h.scheduler.generation();

            h.scheduler.inner.on_warning_deadline(generation);
            assert_eq!(h.prompt.show_count(), 1);
        }
    }

    mod logout_tests {
        use super::*;

        #[test]
        fn test_idle_scenario_logs_out_exactly_once() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();

            h.clock.advance(44 * MINUTE);
            assert_eq!(h.prompt.last_seconds(), Some(60));

            h.clock.advance(MINUTE - Duration::from_millis(1));
            assert_eq!(h.navigator.visit_count(), 0);
            h.clock.advance(Duration::from_millis(1));

            assert_eq!(h.navigator.visits(), vec!["login.html"]);
            assert_eq!(h.shared.get("authToken").unwrap(), None);
            assert!(h.shared.get("gc_force_logout").unwrap().is_some());

            h.clock.advance(10 * 45 * MINUTE);
            assert_eq!(h.navigator.visit_count(), 1);
        }

        #[test]
        fn test_logout_fires_twice_is_noop() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            let generation = h.scheduler.generation();
            h.clock.advance(45 * MINUTE);

            h.scheduler.inner.on_logout_deadline(generation);
            h.scheduler.logout_now();
            assert_eq!(h.navigator.visit_count(), 1);
            assert_eq!(h.shared.write_count(), 1);
        }

        #[test]
        fn test_halt_cancels_without_logout() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();
            h.clock.advance(44 * MINUTE + Duration::from_secs(1));

            assert!(h.scheduler.halt());
            assert!(!h.scheduler.halt());
            assert_eq!(h.prompt.hide_count(), 1);
            assert_eq!(h.clock.pending_count(), 0);

            h.clock.advance(2 * MINUTE);
            assert_eq!(h.navigator.visit_count(), 0);
            assert_eq!(h.shared.get("authToken").unwrap(), Some("jwt".to_string()));
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn test_status_progression() {
            let h = harness(GuardConfig::default());
            h.scheduler.arm();

            let status = h.scheduler.status();
            assert_eq!(status.state, GuardState::Watching);
            assert_eq!(status.warning_in_ms, Some(44 * 60 * 1000));
            assert_eq!(status.logout_in_ms, Some(45 * 60 * 1000));
            assert_eq!(status.countdown_remaining, None);

            h.clock.advance(44 * MINUTE + Duration::from_secs(5));
            let status = h.scheduler.status();
            assert_eq!(status.state, GuardState::Warning);
            assert_eq!(status.warning_in_ms, None);
            assert_eq!(status.logout_in_ms, Some(55 * 1000));
            assert_eq!(status.countdown_remaining, Some(55));

            h.clock.advance(MINUTE);
            let status = h.scheduler.status();
            assert_eq!(status.state, GuardState::Terminated);
            assert_eq!(status.logout_in_ms, None);
        }
    }
}
