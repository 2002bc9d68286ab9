//! Per-page bootstrap.

use std::sync::Arc;

use tracing::{debug, info};

use crate::activity::{ActivityHandler, ActivityKind, ActivityMonitor, ActivitySource};
use crate::clock::Clock;
use crate::storage::{CrossTabChannel, KeyValueStore, SubscriptionId};
use crate::types::{GuardConfig, GuardStatus, PromptAction};

use super::{CrossTabNotifier, InactivityScheduler, Navigator, SessionTerminator, WarningPrompt};

/// Everything the guard needs from the page it runs in.
#[derive(Clone)]
pub struct PageContext {
    /// Location of the page, e.g. `/app/dashboard.html?tab=2`
    pub path: String,
    pub clock: Arc<dyn Clock>,
    pub activity: Arc<dyn ActivitySource>,
    pub prompt: Arc<dyn WarningPrompt>,
    pub navigator: Arc<dyn Navigator>,
    /// Origin-wide storage holding the credential token
    pub persistent: Arc<dyn KeyValueStore>,
    /// Page-scoped storage cleared on logout
    pub transient: Arc<dyn KeyValueStore>,
    /// Channel shared with the other tabs of the origin
    pub channel: Arc<dyn CrossTabChannel>,
}

struct ActiveGuard {
    monitor: Arc<ActivityMonitor>,
    activity_subscription: SubscriptionId,
    notifier: Arc<CrossTabNotifier>,
    scheduler: InactivityScheduler,
}

/// The inactivity guard of one page.
///
/// On the login page the guard is inert: nothing is registered and
/// [`SessionGuard::status`] reports [`GuardState::Inactive`](crate::types::GuardState::Inactive).
pub struct SessionGuard {
    config: GuardConfig,
    active: Option<ActiveGuard>,
}

impl SessionGuard {
    /// Installs the guard on `page` and arms the first inactivity window.
    pub fn install(config: GuardConfig, page: PageContext) -> Self {
        if config.is_login_path(&page.path) {
            info!(path = %page.path, "login page, inactivity guard not installed");
            return Self {
                config,
                active: None,
            };
        }

        let notifier = Arc::new(CrossTabNotifier::new(
            page.channel.clone(),
            config.logout_channel_key.clone(),
            config.login_path.clone(),
            page.navigator.clone(),
        ));
        let terminator = Arc::new(SessionTerminator::new(
            notifier.clone(),
            page.persistent.clone(),
            page.transient.clone(),
            page.navigator.clone(),
            config.credential_key.clone(),
            config.login_path.clone(),
        ));
        let scheduler = InactivityScheduler::new(
            config.clone(),
            page.clock.clone(),
            page.prompt.clone(),
            terminator,
        );

        let monitor = ActivityMonitor::new(page.clock.clone(), config.throttle_interval);
        let weak = scheduler.downgrade();
        let on_activity: ActivityHandler = Arc::new(move |_: ActivityKind| {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.arm();
            }
        });
        let activity_subscription = monitor.subscribe(on_activity);
        monitor.attach(page.activity.clone());

        let weak = scheduler.downgrade();
        notifier.listen(move || {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.halt();
            }
        });

        scheduler.arm();
        info!(
            path = %page.path,
            limit_secs = config.inactivity_limit.as_secs(),
            lead_secs = config.warning_lead_time.as_secs(),
            "inactivity guard installed"
        );

        Self {
            config,
            active: Some(ActiveGuard {
                monitor,
                activity_subscription,
                notifier,
                scheduler,
            }),
        }
    }

    /// Returns true unless the guard was installed on the login page.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Forwards a button press of the warning prompt.
    pub fn prompt_action(&self, action: PromptAction) {
        match &self.active {
            Some(active) => active.scheduler.handle_prompt_action(action),
            None => debug!(action = ?action, "prompt action on inactive guard ignored"),
        }
    }

    /// Removes every listener and subscription and stops the timers.
    ///
    /// The session itself is left alone. Detaching twice is harmless.
    pub fn detach(&self) {
        if let Some(active) = &self.active {
            active.monitor.detach();
            active.monitor.unsubscribe(active.activity_subscription);
            active.notifier.stop();
            active.scheduler.halt();
            debug!("inactivity guard detached");
        }
    }

    pub fn status(&self) -> GuardStatus {
        match &self.active {
            Some(active) => active.scheduler.status(),
            None => GuardStatus::inactive(),
        }
    }

    /// The scheduler, if the guard is active.
    pub fn scheduler(&self) -> Option<&InactivityScheduler> {
        self.active.as_ref().map(|active| &active.scheduler)
    }

    /// The activity monitor, if the guard is active.
    pub fn monitor(&self) -> Option<&Arc<ActivityMonitor>> {
        self.active.as_ref().map(|active| &active.monitor)
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("config", &self.config)
            .field("active", &self.is_active())
            .finish()
    }
}
