//! Session lifecycle: deadlines, warning prompt, logout and cross-tab sync.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ activity ┌─────────────────────┐ deadline ┌───────────────────┐
//! │ActivityMonitor│────────▶│ InactivityScheduler │─────────▶│ SessionTerminator │
//! └──────────────┘   arm()  │  warning / logout   │          │ broadcast, clear, │
//!                           │  countdown          │          │ navigate          │
//!                           └─────────▲───────────┘          └────────┬──────────┘
//!                                     │ halt()                        │ publish
//!                           ┌─────────┴───────────┐                   │
//!                           │  CrossTabNotifier   │◀──────────────────┘
//!                           │  (other tabs)       │
//!                           └─────────────────────┘
//! ```
//!
//! [`SessionGuard`] wires these together for one page.

mod guard;
mod navigator;
mod notifier;
mod prompt;
mod scheduler;
mod terminator;

pub use guard::{PageContext, SessionGuard};
pub use navigator::{MockNavigator, Navigator};
pub use notifier::{next_broadcast_value, CrossTabNotifier};
pub use prompt::{MockPrompt, PromptEvent, WarningPrompt};
pub use scheduler::{InactivityScheduler, TimerState, WeakScheduler};
pub use terminator::{LogoutReport, LogoutStep, SessionTerminator};
