//! Cross-tab logout propagation.
//!
//! The protocol is a single key on origin-wide storage:
//!
//! ```text
//! tab A (logs out)                 tab B, tab C (idle)
//! ────────────────                 ───────────────────
//! publish(key, <millis>) ────────▶ change(key) ──▶ navigate(login)
//! ```
//!
//! Receivers only redirect. They never rewrite the key or clear storage,
//! which keeps a logout from echoing between tabs.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::storage::{ChangeHandler, CrossTabChannel, StorageChange, StorageError, SubscriptionId};

use super::Navigator;

/// Publishes and observes logout broadcasts for one tab.
pub struct CrossTabNotifier {
    channel: Arc<dyn CrossTabChannel>,
    key: String,
    login_path: String,
    navigator: Arc<dyn Navigator>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl CrossTabNotifier {
    pub fn new(
        channel: Arc<dyn CrossTabChannel>,
        key: impl Into<String>,
        login_path: impl Into<String>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            channel,
            key: key.into(),
            login_path: login_path.into(),
            navigator,
            subscription: Mutex::new(None),
        }
    }

    /// Writes a fresh timestamp under the logout key.
    ///
    /// Returns the value written.
    pub fn broadcast_logout(&self) -> Result<String, StorageError> {
        // A failed read only weakens the monotonic guarantee.
        let previous = self.channel.read(&self.key).unwrap_or_default();
        let value = next_broadcast_value(
            previous.as_deref(),
            chrono::Utc::now().timestamp_millis(),
        );
        self.channel.publish(&self.key, &value)?;
        debug!(key = %self.key, value = %value, "logout broadcast written");
        Ok(value)
    }

    /// Subscribes to logout broadcasts from other tabs.
    ///
    /// On each broadcast `on_remote_logout` runs first (to stop local
    /// timers), then the tab navigates to the login page. Listening again
    /// replaces the previous subscription.
    pub fn listen(&self, on_remote_logout: impl Fn() + Send + Sync + 'static) {
        self.stop();

        let navigator = self.navigator.clone();
        let login_path = self.login_path.clone();
        let key = self.key.clone();
        let handler: ChangeHandler = Arc::new(move |change: &StorageChange| {
            if change.key != key {
                return;
            }
            info!(key = %change.key, "logout broadcast received from another tab");
            on_remote_logout();
            navigator.navigate(&login_path);
        });

        let id = self.channel.on_change(&self.key, handler);
        *self.subscription.lock() = Some(id);
    }

    /// Cancels the subscription made by [`CrossTabNotifier::listen`].
    pub fn stop(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.channel.unsubscribe(id);
        }
    }

    /// Returns true while subscribed.
    pub fn is_listening(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// The storage key used for broadcasts.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for CrossTabNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossTabNotifier")
            .field("key", &self.key)
            .field("login_path", &self.login_path)
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// Picks the value to publish: the current time in milliseconds, bumped
/// past the stored value so that the write is always a visible transition.
pub fn next_broadcast_value(previous: Option<&str>, now_millis: i64) -> String {
    let previous = previous.and_then(|p| p.trim().parse::<i64>().ok());
    let value = match previous {
        Some(prev) if prev >= now_millis => prev.saturating_add(1),
        _ => now_millis,
    };
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockNavigator;
    use crate::storage::{ChannelHub, MemoryStore};

    fn notifier_for(
        hub: &Arc<ChannelHub>,
    ) -> (CrossTabNotifier, Arc<MockNavigator>) {
        let navigator = Arc::new(MockNavigator::new());
        let notifier = CrossTabNotifier::new(
            Arc::new(hub.open_tab()),
            "gc_force_logout",
            "login.html",
            navigator.clone(),
        );
        (notifier, navigator)
    }

    #[test]
    fn test_next_broadcast_value() {
        assert_eq!(next_broadcast_value(None, 1000), "1000");
        assert_eq!(next_broadcast_value(Some("500"), 1000), "1000");
        assert_eq!(next_broadcast_value(Some("1000"), 1000), "1001");
        assert_eq!(next_broadcast_value(Some("2000"), 1000), "2001");
        assert_eq!(next_broadcast_value(Some("garbage"), 1000), "1000");
    }

    #[test]
    fn test_broadcast_redirects_other_tabs_only() {
        let hub = ChannelHub::in_memory();
        let (tab_a, nav_a) = notifier_for(&hub);
        let (tab_b, nav_b) = notifier_for(&hub);
        tab_a.listen(|| {});
        tab_b.listen(|| {});

        tab_a.broadcast_logout().unwrap();

        assert_eq!(nav_a.visit_count(), 0);
        assert_eq!(nav_b.visits(), vec!["login.html"]);
    }

    #[test]
    fn test_receiver_does_not_rebroadcast() {
        let store = Arc::new(MemoryStore::new());
        let hub = ChannelHub::new(store.clone());
        let (tab_a, _) = notifier_for(&hub);
        let (tab_b, _) = notifier_for(&hub);
        tab_b.listen(|| {});

        tab_a.broadcast_logout().unwrap();
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.clear_count(), 0);
    }

    #[test]
    fn test_remote_logout_callback_runs_before_navigation() {
        let hub = ChannelHub::in_memory();
        let (tab_a, _) = notifier_for(&hub);
        let (tab_b, nav_b) = notifier_for(&hub);

        let seen_visits = Arc::new(Mutex::new(None));
        let sink = seen_visits.clone();
        let nav = nav_b.clone();
        tab_b.listen(move || {
            *sink.lock() = Some(nav.visit_count());
        });

        tab_a.broadcast_logout().unwrap();
        assert_eq!(*seen_visits.lock(), Some(0));
        assert_eq!(nav_b.visit_count(), 1);
    }

    #[test]
    fn test_consecutive_broadcasts_are_distinct() {
        let hub = ChannelHub::in_memory();
        let (tab_a, _) = notifier_for(&hub);
        let (tab_b, nav_b) = notifier_for(&hub);
        tab_b.listen(|| {});

        let first = tab_a.broadcast_logout().unwrap();
        let second = tab_a.broadcast_logout().unwrap();
        assert_ne!(first, second);
        assert_eq!(nav_b.visit_count(), 2);
    }

    #[test]
    fn test_stop_listening() {
        let hub = ChannelHub::in_memory();
        let (tab_a, _) = notifier_for(&hub);
        let (tab_b, nav_b) = notifier_for(&hub);
        tab_b.listen(|| {});
        assert!(tab_b.is_listening());

        tab_b.stop();
        assert!(!tab_b.is_listening());
        assert_eq!(hub.subscriber_count(), 0);

        tab_a.broadcast_logout().unwrap();
        assert_eq!(nav_b.visit_count(), 0);
    }

    #[test]
    fn test_broadcast_error_is_returned() {
        let store = Arc::new(MemoryStore::new());
        store.set_should_fail(true);
        let hub = ChannelHub::new(store);
        let (tab_a, _) = notifier_for(&hub);
        assert!(tab_a.broadcast_logout().is_err());
    }
}
