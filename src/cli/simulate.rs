//! Virtual-time simulation of several tabs sharing one origin.
//!
//! Every tab runs a real [`SessionGuard`] over an in-process
//! [`ChannelHub`]; only the clock is virtual. User input is applied to the
//! first tab, the others stay idle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

use crate::activity::{ActivityKind, EventTarget};
use crate::clock::MockClock;
use crate::session::{Navigator, PageContext, SessionGuard, WarningPrompt};
use crate::storage::{ChannelHub, KeyValueStore, MemoryStore};
use crate::types::{GuardConfig, GuardStatus, PromptAction, MAX_CONFIG_DURATION};

use super::SimulateArgs;

/// Token placed in the shared store before the simulation starts.
const SIMULATED_TOKEN: &str = "simulated-session-token";

// ============================================================================
// Report types
// ============================================================================

/// What happened at one point of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Activity,
    StaySignedIn,
    SignOutNow,
    WarningShown,
    WarningHidden,
    Redirected,
}

/// One line of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// Milliseconds since the simulation started
    #[serde(rename = "atMs")]
    pub at_ms: u64,
    /// Tab index, starting at 0
    pub tab: usize,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final state of one tab.
#[derive(Debug, Clone, Serialize)]
pub struct TabOutcome {
    pub tab: usize,
    pub status: GuardStatus,
    #[serde(rename = "redirectedTo")]
    pub redirected_to: Option<String>,
}

/// Result of [`simulate`].
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub timeline: Vec<TimelineEntry>,
    pub tabs: Vec<TabOutcome>,
    /// Whether the credential token survived
    #[serde(rename = "credentialPresent")]
    pub credential_present: bool,
}

impl SimulationReport {
    /// Entries of one kind.
    pub fn entries_of(&self, kind: EventKind) -> impl Iterator<Item = &TimelineEntry> {
        self.timeline.iter().filter(move |entry| entry.kind == kind)
    }
}

// ============================================================================
// Recording collaborators
// ============================================================================

struct Timeline {
    clock: Arc<MockClock>,
    entries: Mutex<Vec<TimelineEntry>>,
}

impl Timeline {
    fn record(&self, tab: usize, kind: EventKind, detail: Option<String>) {
        let at_ms = self.clock.elapsed().as_millis() as u64;
        self.entries.lock().push(TimelineEntry {
            at_ms,
            tab,
            kind,
            detail,
        });
    }
}

struct RecordingPrompt {
    tab: usize,
    timeline: Arc<Timeline>,
}

impl WarningPrompt for RecordingPrompt {
    fn show(&self, seconds: u64) {
        self.timeline
            .record(self.tab, EventKind::WarningShown, Some(format!("{seconds}s")));
    }

    fn update(&self, seconds: u64) {
        trace!(tab = self.tab, seconds, "countdown");
    }

    fn hide(&self) {
        self.timeline.record(self.tab, EventKind::WarningHidden, None);
    }
}

struct RecordingNavigator {
    tab: usize,
    timeline: Arc<Timeline>,
    destination: Mutex<Option<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.timeline
            .record(self.tab, EventKind::Redirected, Some(path.to_string()));
        *self.destination.lock() = Some(path.to_string());
    }
}

struct SimulatedTab {
    guard: SessionGuard,
    events: Arc<EventTarget>,
    navigator: Arc<RecordingNavigator>,
}

impl SimulatedTab {
    fn has_left(&self) -> bool {
        self.navigator.destination.lock().is_some()
    }
}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Input {
    Activity,
    Action(PromptAction),
}

/// Runs the scenario described by `args` under `config`.
pub fn simulate(config: &GuardConfig, args: &SimulateArgs) -> SimulationReport {
    let clock = Arc::new(MockClock::new());
    let store = Arc::new(MemoryStore::with_entries([(
        config.credential_key.as_str(),
        SIMULATED_TOKEN,
    )]));
    let hub = ChannelHub::new(store.clone());
    let timeline = Arc::new(Timeline {
        clock: clock.clone(),
        entries: Mutex::new(Vec::new()),
    });

    let tabs: Vec<SimulatedTab> = (0..usize::from(args.tabs))
        .map(|tab| {
            let events = Arc::new(EventTarget::new());
            let navigator = Arc::new(RecordingNavigator {
                tab,
                timeline: timeline.clone(),
                destination: Mutex::new(None),
            });
            let page = PageContext {
                path: args.path.clone(),
                clock: clock.clone(),
                activity: events.clone(),
                prompt: Arc::new(RecordingPrompt {
                    tab,
                    timeline: timeline.clone(),
                }),
                navigator: navigator.clone(),
                persistent: store.clone(),
                transient: Arc::new(MemoryStore::new()),
                channel: Arc::new(hub.open_tab()),
            };
            SimulatedTab {
                guard: SessionGuard::install(config.clone(), page),
                events,
                navigator,
            }
        })
        .collect();

    let mut inputs: Vec<(Duration, Input)> = args
        .activity
        .iter()
        .map(|at| (*at, Input::Activity))
        .chain(
            args.stay_at
                .iter()
                .map(|at| (*at, Input::Action(PromptAction::StaySignedIn))),
        )
        .chain(
            args.sign_out_at
                .map(|at| (at, Input::Action(PromptAction::SignOutNow))),
        )
        .collect();
    inputs.sort_by_key(|(at, _)| *at);

    // Run one full inactivity window past the last input, at most 30 days.
    let duration = args.duration.unwrap_or_else(|| {
        let last_input = inputs.last().map_or(Duration::ZERO, |(at, _)| *at);
        last_input
            .saturating_add(config.inactivity_limit.min(MAX_CONFIG_DURATION))
            .saturating_add(Duration::from_secs(1))
    });

    for (at, input) in inputs {
        if at > duration {
            break;
        }
        clock.advance(at.saturating_sub(clock.elapsed()));

        let Some(first) = tabs.first() else { break };
        if first.has_left() {
            continue;
        }
        match input {
            Input::Activity => {
                timeline.record(0, EventKind::Activity, None);
                first.events.dispatch(ActivityKind::KeyDown);
            }
            Input::Action(action) => {
                let kind = match action {
                    PromptAction::StaySignedIn => EventKind::StaySignedIn,
                    PromptAction::SignOutNow => EventKind::SignOutNow,
                };
                timeline.record(0, kind, None);
                first.guard.prompt_action(action);
            }
        }
    }
    clock.advance(duration.saturating_sub(clock.elapsed()));

    let outcomes = tabs
        .iter()
        .enumerate()
        .map(|(tab, sim)| TabOutcome {
            tab,
            status: sim.guard.status(),
            redirected_to: sim.navigator.destination.lock().clone(),
        })
        .collect();
    let credential_present = matches!(store.get(&config.credential_key), Ok(Some(_)));
    let entries = timeline.entries.lock().clone();

    SimulationReport {
        duration_ms: duration.as_millis() as u64,
        timeline: entries,
        tabs: outcomes,
        credential_present,
    }
}

// ============================================================================
// Tests
// ============================================================================
