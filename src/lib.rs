//! Idle Logout Library
//!
//! Client-side session inactivity guard. It includes:
//! - Activity detection with a shared throttle
//! - Warning and logout deadlines with a visible countdown
//! - Best-effort session termination
//! - Cross-tab logout propagation over shared storage
//! - Injectable clocks, storage and display surfaces
//! - CLI command parsing, simulation and display utilities

pub mod activity;
pub mod cli;
pub mod clock;
pub mod session;
pub mod storage;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    ConfigError, GuardConfig, GuardState, GuardStatus, PromptAction, DEFAULT_INACTIVITY_LIMIT,
    DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_CHANNEL_KEY, DEFAULT_WARNING_LEAD_TIME, MAX_CONFIG_DURATION,
};

pub use activity::{ActivityKind, ActivityMonitor, ActivitySource, EventTarget, Throttle};

pub use clock::{Clock, MockClock, TimerHandle, TokioClock};

pub use session::{
    CrossTabNotifier, InactivityScheduler, LogoutReport, LogoutStep, MockNavigator, MockPrompt,
    Navigator, PageContext, PromptEvent, SessionGuard, SessionTerminator, WarningPrompt,
};

pub use storage::{
    ChannelHub, CrossTabChannel, FileChannel, FileStore, KeyValueStore, MemoryStore, StorageError,
    TabChannel,
};
