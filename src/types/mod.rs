//! Core data types for the inactivity guard.
//!
//! This module defines the data structures used for:
//! - Guard configuration with validation and JSON loading
//! - Prompt actions exposed by the warning dialog
//! - Status snapshots for display and serialization

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Defaults
// ============================================================================

/// Default inactivity limit (45 minutes).
pub const DEFAULT_INACTIVITY_LIMIT: Duration = Duration::from_secs(45 * 60);

/// Default warning lead time (60 seconds before logout).
pub const DEFAULT_WARNING_LEAD_TIME: Duration = Duration::from_secs(60);

/// Default login destination.
pub const DEFAULT_LOGIN_PATH: &str = "login.html";

/// Default key used to broadcast logout across tabs.
pub const DEFAULT_LOGOUT_CHANNEL_KEY: &str = "gc_force_logout";

/// Default key of the persistent credential token.
pub const DEFAULT_CREDENTIAL_KEY: &str = "authToken";

/// Default minimum spacing between two activity-triggered resets.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(1);

/// Lower bound applied to the warning delay.
pub const MIN_WARNING_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for every configured duration (30 days).
pub const MAX_CONFIG_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

// ============================================================================
// ConfigError
// ============================================================================

/// Errors raised while loading or validating a [`GuardConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The warning would start before (or exactly when) the session begins.
    #[error("warning lead time ({lead:?}) must be shorter than the inactivity limit ({limit:?})")]
    WarningLeadTooLong { lead: Duration, limit: Duration },

    /// A duration is longer than [`MAX_CONFIG_DURATION`].
    #[error("{field} ({value:?}) must not exceed {max:?}")]
    DurationTooLong {
        field: &'static str,
        value: Duration,
        max: Duration,
    },

    /// The login destination is empty.
    #[error("login path must not be empty")]
    EmptyLoginPath,

    /// The broadcast channel key is empty.
    #[error("logout channel key must not be empty")]
    EmptyChannelKey,
}

// ============================================================================
// GuardConfig
// ============================================================================

/// Configuration for the inactivity guard.
///
/// Durations are serialized as whole milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Idle time after which the session is terminated.
    #[serde(rename = "inactivityLimitMs", with = "millis")]
    pub inactivity_limit: Duration,
    /// How long before logout the warning prompt appears.
    #[serde(rename = "warningLeadTimeMs", with = "millis")]
    pub warning_lead_time: Duration,
    /// Where the browser is sent after logout.
    #[serde(rename = "loginPath")]
    pub login_path: String,
    /// Shared key written to broadcast logout to other tabs.
    #[serde(rename = "logoutChannelKey")]
    pub logout_channel_key: String,
    /// Persistent token removed on logout.
    #[serde(rename = "credentialKey")]
    pub credential_key: String,
    /// Minimum spacing between two activity-triggered resets.
    #[serde(rename = "throttleIntervalMs", with = "millis")]
    pub throttle_interval: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            inactivity_limit: DEFAULT_INACTIVITY_LIMIT,
            warning_lead_time: DEFAULT_WARNING_LEAD_TIME,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_channel_key: DEFAULT_LOGOUT_CHANNEL_KEY.to_string(),
            credential_key: DEFAULT_CREDENTIAL_KEY.to_string(),
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
        }
    }
}

impl GuardConfig {
    /// Sets the inactivity limit.
    pub fn with_inactivity_limit(mut self, limit: Duration) -> Self {
        self.inactivity_limit = limit;
        self
    }

    /// Sets the warning lead time.
    pub fn with_warning_lead_time(mut self, lead: Duration) -> Self {
        self.warning_lead_time = lead;
        self
    }

    /// Sets the login destination.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Sets the broadcast channel key.
    pub fn with_logout_channel_key(mut self, key: impl Into<String>) -> Self {
        self.logout_channel_key = key.into();
        self
    }

    /// Sets the persistent credential key.
    pub fn with_credential_key(mut self, key: impl Into<String>) -> Self {
        self.credential_key = key.into();
        self
    }

    /// Sets the activity throttle interval.
    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults. The result is not
    /// validated; call [`GuardConfig::validate`] to check it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validates the configuration.
    ///
    /// Returns every problem found. An invalid lead time is still usable:
    /// the warning delay is clamped by [`GuardConfig::warning_delay`].
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut problems: Vec<ConfigError> = self.duration_problems().collect();
        if self.warning_lead_time >= self.inactivity_limit {
            problems.push(ConfigError::WarningLeadTooLong {
                lead: self.warning_lead_time,
                limit: self.inactivity_limit,
            });
        }
        if self.login_path.trim().is_empty() {
            problems.push(ConfigError::EmptyLoginPath);
        }
        if self.logout_channel_key.is_empty() {
            problems.push(ConfigError::EmptyChannelKey);
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Fails if a duration is too long to schedule.
    ///
    /// Unlike the other problems reported by [`GuardConfig::validate`],
    /// these cannot be clamped into something usable.
    pub fn ensure_schedulable(&self) -> Result<(), ConfigError> {
        match self.duration_problems().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }

    fn duration_problems(&self) -> impl Iterator<Item = ConfigError> {
        [
            ("inactivity limit", self.inactivity_limit),
            ("warning lead time", self.warning_lead_time),
            ("throttle interval", self.throttle_interval),
        ]
        .into_iter()
        .filter(|(_, value)| *value > MAX_CONFIG_DURATION)
        .map(|(field, value)| ConfigError::DurationTooLong {
            field,
            value,
            max: MAX_CONFIG_DURATION,
        })
    }

    /// Delay from the last activity until the warning prompt appears.
    ///
    /// Never shorter than one second.
    pub fn warning_delay(&self) -> Duration {
        self.inactivity_limit
            .saturating_sub(self.warning_lead_time)
            .max(MIN_WARNING_DELAY)
    }

    /// Initial value of the warning countdown, in whole seconds (rounded up).
    pub fn countdown_seconds(&self) -> u64 {
        let millis = self.warning_lead_time.as_millis();
        millis.div_ceil(1000) as u64
    }

    /// Returns true if `path` points at the login destination.
    ///
    /// Query strings and fragments are ignored.
    pub fn is_login_path(&self, path: &str) -> bool {
        let login = self.login_path.trim_start_matches('/');
        if login.is_empty() {
            return false;
        }
        let path = path.split(['?', '#']).next().unwrap_or_default();
        path == login || path.ends_with(&format!("/{login}"))
    }
}

/// Serde adapter for durations stored as milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// PromptAction
// ============================================================================

/// Buttons offered by the warning prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptAction {
    /// Keep the session and restart the inactivity window.
    StaySignedIn,
    /// Terminate the session immediately.
    SignOutNow,
}

impl PromptAction {
    /// Returns the button label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            PromptAction::StaySignedIn => "Stay signed in",
            PromptAction::SignOutNow => "Sign out now",
        }
    }
}

// ============================================================================
// GuardState / GuardStatus
// ============================================================================

/// Lifecycle of a guard on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// Installed on the login page: nothing is monitored.
    Inactive,
    /// Timers are armed and activity is tracked.
    Watching,
    /// The warning prompt is on screen.
    Warning,
    /// The session ended (locally or through another tab).
    Terminated,
}

impl GuardState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardState::Inactive => "inactive",
            GuardState::Watching => "watching",
            GuardState::Warning => "warning",
            GuardState::Terminated => "terminated",
        }
    }
}

/// Point-in-time snapshot of the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardStatus {
    /// Current lifecycle state
    pub state: GuardState,
    /// Seconds currently shown by the countdown, if the prompt is visible
    #[serde(rename = "countdownRemaining", skip_serializing_if = "Option::is_none")]
    pub countdown_remaining: Option<i64>,
    /// Milliseconds until the warning deadline
    #[serde(rename = "warningInMs", skip_serializing_if = "Option::is_none")]
    pub warning_in_ms: Option<u64>,
    /// Milliseconds until the logout deadline
    #[serde(rename = "logoutInMs", skip_serializing_if = "Option::is_none")]
    pub logout_in_ms: Option<u64>,
}

impl GuardStatus {
    /// Status of a guard that does nothing.
    pub fn inactive() -> Self {
        Self {
            state: GuardState::Inactive,
            countdown_remaining: None,
            warning_in_ms: None,
            logout_in_ms: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod guard_config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = GuardConfig::default();
            assert_eq!(config.inactivity_limit, Duration::from_secs(2700));
            assert_eq!(config.warning_lead_time, Duration::from_secs(60));
            assert_eq!(config.login_path, "login.html");
            assert_eq!(config.logout_channel_key, "gc_force_logout");
            assert_eq!(config.credential_key, "authToken");
            assert_eq!(config.throttle_interval, Duration::from_secs(1));
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_builder() {
            let config = GuardConfig::default()
                .with_inactivity_limit(Duration::from_secs(600))
                .with_warning_lead_time(Duration::from_secs(30))
                .with_login_path("/auth/login")
                .with_logout_channel_key("bye")
                .with_credential_key("jwt")
                .with_throttle_interval(Duration::from_millis(250));
            assert_eq!(config.inactivity_limit, Duration::from_secs(600));
            assert_eq!(config.warning_lead_time, Duration::from_secs(30));
            assert_eq!(config.login_path, "/auth/login");
            assert_eq!(config.logout_channel_key, "bye");
            assert_eq!(config.credential_key, "jwt");
            assert_eq!(config.throttle_interval, Duration::from_millis(250));
        }

        #[test]
        fn test_warning_delay_default() {
            let config = GuardConfig::default();
            assert_eq!(config.warning_delay(), Duration::from_secs(44 * 60));
        }

        #[test]
        fn test_warning_delay_clamped_when_lead_too_long() {
            let config = GuardConfig::default()
                .with_inactivity_limit(Duration::from_secs(30))
                .with_warning_lead_time(Duration::from_secs(60));
            assert_eq!(config.warning_delay(), Duration::from_secs(1));

            let equal = GuardConfig::default()
                .with_inactivity_limit(Duration::from_secs(60))
                .with_warning_lead_time(Duration::from_secs(60));
            assert_eq!(equal.warning_delay(), Duration::from_secs(1));
        }

        #[test]
        fn test_countdown_seconds_rounds_up() {
            let config = GuardConfig::default();
            assert_eq!(config.countdown_seconds(), 60);

            let config = config.with_warning_lead_time(Duration::from_millis(1500));
            assert_eq!(config.countdown_seconds(), 2);

            let config = config.with_warning_lead_time(Duration::ZERO);
            assert_eq!(config.countdown_seconds(), 0);
        }

        #[test]
        fn test_validate_reports_every_problem() {
            let config = GuardConfig::default()
                .with_inactivity_limit(Duration::from_secs(10))
                .with_login_path("  ")
                .with_logout_channel_key("");
            let problems = config.validate().unwrap_err();
            assert_eq!(problems.len(), 3);
            assert!(matches!(problems[0], ConfigError::WarningLeadTooLong { .. }));
            assert!(matches!(problems[1], ConfigError::EmptyLoginPath));
            assert!(matches!(problems[2], ConfigError::EmptyChannelKey));
        }

        #[test]
        fn test_validate_rejects_durations_beyond_maximum() {
            let config = GuardConfig::default()
                .with_inactivity_limit(Duration::from_secs(u64::MAX / 2))
                .with_warning_lead_time(MAX_CONFIG_DURATION + Duration::from_millis(1));
            let problems = config.validate().unwrap_err();
            assert_eq!(problems.len(), 2);
            assert!(matches!(
                problems[0],
                ConfigError::DurationTooLong { field: "inactivity limit", .. }
            ));
            assert!(matches!(
                problems[1],
                ConfigError::DurationTooLong { field: "warning lead time", .. }
            ));

            let err = config.ensure_schedulable().unwrap_err();
            assert!(err.to_string().contains("inactivity limit"));
        }

        #[test]
        fn test_maximum_duration_is_accepted() {
            let config = GuardConfig::default().with_inactivity_limit(MAX_CONFIG_DURATION);
            assert!(config.validate().is_ok());
            assert!(config.ensure_schedulable().is_ok());

            // A lead time problem is reported but still schedulable
            let config = GuardConfig::default().with_inactivity_limit(Duration::from_secs(30));
            assert!(config.validate().is_err());
            assert!(config.ensure_schedulable().is_ok());
        }

        #[test]
        fn test_is_login_path() {
            let config = GuardConfig::default();
            assert!(config.is_login_path("login.html"));
            assert!(config.is_login_path("/login.html"));
            assert!(config.is_login_path("/app/login.html"));
            assert!(config.is_login_path("/login.html?next=/home"));
            assert!(config.is_login_path("/login.html#top"));
            assert!(!config.is_login_path("/dashboard.html"));
            assert!(!config.is_login_path("/notlogin.html"));
            assert!(!config.is_login_path("/login.html/extra"));
        }

        #[test]
        fn test_is_login_path_with_leading_slash_in_config() {
            let config = GuardConfig::default().with_login_path("/auth/login");
            assert!(config.is_login_path("/auth/login"));
            assert!(config.is_login_path("/tenant/auth/login"));
            assert!(!config.is_login_path("/auth/logout"));
        }

        #[test]
        fn test_serialize_uses_milliseconds() {
            let json = serde_json::to_value(GuardConfig::default()).unwrap();
            assert_eq!(json["inactivityLimitMs"], 2_700_000);
            assert_eq!(json["warningLeadTimeMs"], 60_000);
            assert_eq!(json["loginPath"], "login.html");
            assert_eq!(json["logoutChannelKey"], "gc_force_logout");
        }

        #[test]
        fn test_deserialize_partial_uses_defaults() {
            let config: GuardConfig =
                serde_json::from_str(r#"{"inactivityLimitMs": 120000}"#).unwrap();
            assert_eq!(config.inactivity_limit, Duration::from_secs(120));
            assert_eq!(config.warning_lead_time, DEFAULT_WARNING_LEAD_TIME);
            assert_eq!(config.login_path, DEFAULT_LOGIN_PATH);
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("guard.json");
            std::fs::write(&path, r#"{"loginPath": "/signin", "warningLeadTimeMs": 5000}"#)
                .unwrap();

            let config = GuardConfig::load(&path).unwrap();
            assert_eq!(config.login_path, "/signin");
            assert_eq!(config.warning_lead_time, Duration::from_secs(5));
        }

        #[test]
        fn test_load_missing_file() {
            let err = GuardConfig::load("/nonexistent/guard.json").unwrap_err();
            assert!(matches!(err, ConfigError::Read { .. }));
            assert!(err.to_string().contains("/nonexistent/guard.json"));
        }

        #[test]
        fn test_load_invalid_json() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("broken.json");
            std::fs::write(&path, "{ not json").unwrap();
            let err = GuardConfig::load(&path).unwrap_err();
            assert!(matches!(err, ConfigError::Parse { .. }));
        }
    }

    mod prompt_action_tests {
        use super::*;

        #[test]
        fn test_labels() {
            assert_eq!(PromptAction::StaySignedIn.label(), "Stay signed in");
            assert_eq!(PromptAction::SignOutNow.label(), "Sign out now");
        }

        #[test]
        fn test_serialize() {
            let json = serde_json::to_string(&PromptAction::SignOutNow).unwrap();
            assert_eq!(json, "\"sign_out_now\"");
        }
    }

    mod guard_status_tests {
        use super::*;

        #[test]
        fn test_state_as_str() {
            assert_eq!(GuardState::Inactive.as_str(), "inactive");
            assert_eq!(GuardState::Watching.as_str(), "watching");
            assert_eq!(GuardState::Warning.as_str(), "warning");
            assert_eq!(GuardState::Terminated.as_str(), "terminated");
        }

        #[test]
        fn test_inactive_status_serializes_compactly() {
            let json = serde_json::to_string(&GuardStatus::inactive()).unwrap();
            assert_eq!(json, r#"{"state":"inactive"}"#);
        }
    }
}
