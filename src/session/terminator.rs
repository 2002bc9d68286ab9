//! Session termination.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::storage::KeyValueStore;

use super::{CrossTabNotifier, Navigator};

/// A cleanup step of [`SessionTerminator::logout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutStep {
    /// Writing the cross-tab broadcast record
    Broadcast,
    /// Removing the persistent credential token
    RemoveCredential,
    /// Clearing the page-scoped transient store
    ClearTransient,
}

impl fmt::Display for LogoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoutStep::Broadcast => write!(f, "broadcast"),
            LogoutStep::RemoveCredential => write!(f, "remove_credential"),
            LogoutStep::ClearTransient => write!(f, "clear_transient"),
        }
    }
}

/// Outcome of a logout. Navigation always happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutReport {
    /// Steps that failed and were skipped
    pub failed: Vec<LogoutStep>,
    /// Value written to the broadcast key, if the write succeeded
    pub broadcast_value: Option<String>,
}

impl LogoutReport {
    /// Returns true if every cleanup step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ends the session of the current page.
pub struct SessionTerminator {
    notifier: Arc<CrossTabNotifier>,
    persistent: Arc<dyn KeyValueStore>,
    transient: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    credential_key: String,
    login_path: String,
}

impl SessionTerminator {
    pub fn new(
        notifier: Arc<CrossTabNotifier>,
        persistent: Arc<dyn KeyValueStore>,
        transient: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        credential_key: impl Into<String>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            notifier,
            persistent,
            transient,
            navigator,
            credential_key: credential_key.into(),
            login_path: login_path.into(),
        }
    }

    /// Broadcasts, clears credential state and navigates to the login page.
    ///
    /// Each cleanup step is attempted even if an earlier one failed.
    pub fn logout(&self) -> LogoutReport {
        let mut report = LogoutReport::default();

        match self.notifier.broadcast_logout() {
            Ok(value) => report.broadcast_value = Some(value),
            Err(e) => {
                warn!(error = %e, hint = e.suggestion(), "logout broadcast failed");
                report.failed.push(LogoutStep::Broadcast);
            }
        }

        if let Err(e) = self.persistent.remove(&self.credential_key) {
            warn!(key = %self.credential_key, error = %e, "failed to remove credential");
            report.failed.push(LogoutStep::RemoveCredential);
        }

        if let Err(e) = self.transient.clear() {
            warn!(error = %e, "failed to clear transient storage");
            report.failed.push(LogoutStep::ClearTransient);
        }

        info!(
            destination = %self.login_path,
            failed_steps = report.failed.len(),
            "session terminated"
        );
        self.navigator.navigate(&self.login_path);
        report
    }
}

impl fmt::Debug for SessionTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTerminator")
            .field("credential_key", &self.credential_key)
            .field("login_path", &self.login_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockNavigator;
    use crate::storage::{ChannelHub, MemoryStore};

    struct Fixture {
        terminator: SessionTerminator,
        shared: Arc<MemoryStore>,
        transient: Arc<MemoryStore>,
        navigator: Arc<MockNavigator>,
    }

    fn fixture() -> Fixture {
        let shared = Arc::new(MemoryStore::with_entries([("authToken", "jwt")]));
        let transient = Arc::new(MemoryStore::with_entries([("draft", "hello")]));
        let navigator = Arc::new(MockNavigator::new());
        let hub = ChannelHub::new(shared.clone());
        let notifier = Arc::new(CrossTabNotifier::new(
            Arc::new(hub.open_tab()),
            "gc_force_logout",
            "login.html",
            navigator.clone(),
        ));
        let terminator = SessionTerminator::new(
            notifier,
            shared.clone(),
            transient.clone(),
            navigator.clone(),
            "authToken",
            "login.html",
        );
        Fixture {
            terminator,
            shared,
            transient,
            navigator,
        }
    }

    #[test]
    fn test_logout_performs_every_step() {
        let f = fixture();
        let report = f.terminator.logout();

        assert!(report.is_clean());
        assert!(report.broadcast_value.is_some());
        assert_eq!(
            f.shared.get("gc_force_logout").unwrap(),
            report.broadcast_value
        );
        assert_eq!(f.shared.get("authToken").unwrap(), None);
        assert!(f.transient.is_empty());
        assert_eq!(f.navigator.visits(), vec!["login.html"]);
    }

    #[test]
    fn test_shared_storage_failure_still_clears_and_navigates() {
        let f = fixture();
        f.shared.set_should_fail(true);

        let report = f.terminator.logout();
        assert_eq!(
            report.failed,
            vec![LogoutStep::Broadcast, LogoutStep::RemoveCredential]
        );
        assert!(f.transient.is_empty());
        assert_eq!(f.navigator.visit_count(), 1);
    }

    #[test]
    fn test_full_shared_storage_skips_broadcast_only() {
        let f = fixture();
        f.shared.set_quota(Some(f.shared.used_bytes()));

        let report = f.terminator.logout();
        assert_eq!(report.failed, vec![LogoutStep::Broadcast]);
        assert_eq!(report.broadcast_value, None);
        assert_eq!(f.shared.get("gc_force_logout").unwrap(), None);
        assert_eq!(f.shared.get("authToken").unwrap(), None);
        assert!(f.transient.is_empty());
        assert_eq!(f.navigator.visits(), vec!["login.html"]);
    }

    #[test]
    fn test_transient_failure_still_navigates() {
        let f = fixture();
        f.transient.set_should_fail(true);

        let report = f.terminator.logout();
        assert_eq!(report.failed, vec![LogoutStep::ClearTransient]);
        assert_eq!(f.shared.get("authToken").unwrap(), None);
        assert_eq!(f.navigator.visit_count(), 1);
    }

    #[test]
    fn test_everything_failing_still_navigates() {
        let f = fixture();
        f.shared.set_should_fail(true);
        f.transient.set_should_fail(true);

        let report = f.terminator.logout();
        assert_eq!(report.failed.len(), 3);
        assert_eq!(f.navigator.last_visit(), Some("login.html".to_string()));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(LogoutStep::Broadcast.to_string(), "broadcast");
        assert_eq!(LogoutStep::RemoveCredential.to_string(), "remove_credential");
        assert_eq!(LogoutStep::ClearTransient.to_string(), "clear_transient");
    }
}
