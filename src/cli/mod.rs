//! CLI module for idle-logout.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `simulate`: Virtual-time multi-tab simulation
//! - `watch`: Real-time guard driven from the terminal
//! - `display`: Output formatting and display logic

pub mod commands;
pub mod display;
pub mod simulate;
pub mod watch;

pub use commands::{parse_duration, CheckArgs, Cli, Commands, ConfigArgs, SimulateArgs, WatchArgs};
pub use display::{Display, TerminalPrompt};
pub use simulate::{simulate, EventKind, SimulationReport, TabOutcome, TimelineEntry};
pub use watch::{default_state_dir, ChannelNavigator, WatchInput};
