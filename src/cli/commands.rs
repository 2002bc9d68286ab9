//! Command definitions for the idle-logout CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::types::{ConfigError, GuardConfig, MAX_CONFIG_DURATION};

// ============================================================================
// CLI Structure
// ============================================================================

/// Inactivity auto-logout guard
#[derive(Parser, Debug)]
#[command(
    name = "idle-logout",
    version,
    about = "無操作時の自動ログアウトを検証・シミュレートするCLI",
    long_about = "一定時間操作がないセッションを警告の後にログアウトし、\n\
                  同じオリジンの他のタブにもログアウトを伝播します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the effective configuration and report problems
    Check(CheckArgs),

    /// Run the logout protocol in virtual time and print the timeline
    Simulate(SimulateArgs),

    /// Run one real-time tab in this terminal
    Watch(WatchArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Shared configuration arguments
// ============================================================================

/// Configuration file and per-field overrides
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Inactivity limit (e.g. 45m, 90s, 1h)
    #[arg(short, long, value_parser = parse_duration)]
    pub limit: Option<Duration>,

    /// Warning lead time before logout (e.g. 60s)
    #[arg(short = 'w', long, value_parser = parse_duration)]
    pub lead: Option<Duration>,

    /// Login page the session is redirected to
    #[arg(long, value_parser = validate_login_path)]
    pub login_path: Option<String>,

    /// Shared storage key used for the logout broadcast
    #[arg(long)]
    pub channel_key: Option<String>,
}

impl ConfigArgs {
    /// Builds the effective configuration: defaults, then file, then flags.
    pub fn resolve(&self) -> Result<GuardConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => GuardConfig::load(path)?,
            None => GuardConfig::default(),
        };
        if let Some(limit) = self.limit {
            config = config.with_inactivity_limit(limit);
        }
        if let Some(lead) = self.lead {
            config = config.with_warning_lead_time(lead);
        }
        if let Some(path) = &self.login_path {
            config = config.with_login_path(path.clone());
        }
        if let Some(key) = &self.channel_key {
            config = config.with_logout_channel_key(key.clone());
        }
        Ok(config)
    }
}

// ============================================================================
// Command Arguments
// ============================================================================

/// Arguments for the check command
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Exit with an error when the configuration has problems
    #[arg(long)]
    pub strict: bool,

    /// Print the configuration as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the simulate command
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Number of open tabs (1-16)
    #[arg(
        short,
        long,
        default_value = "2",
        value_parser = clap::value_parser!(u8).range(1..=16)
    )]
    pub tabs: u8,

    /// Offset of a key press in the first tab (repeatable)
    #[arg(short, long = "activity", value_name = "OFFSET", value_parser = parse_duration)]
    pub activity: Vec<Duration>,

    /// Offset at which "Stay signed in" is pressed in the first tab (repeatable)
    #[arg(long, value_name = "OFFSET", value_parser = parse_duration)]
    pub stay_at: Vec<Duration>,

    /// Offset at which "Sign out now" is pressed in the first tab
    #[arg(long, value_name = "OFFSET", value_parser = parse_duration)]
    pub sign_out_at: Option<Duration>,

    /// Total simulated time (default: until every tab would have logged out)
    #[arg(short, long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Path of the simulated pages
    #[arg(short, long, default_value = "/app/index.html")]
    pub path: String,

    /// Print the timeline as JSON
    #[arg(long)]
    pub json: bool,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            config: ConfigArgs::default(),
            tabs: 2,
            activity: Vec::new(),
            stay_at: Vec::new(),
            sign_out_at: None,
            duration: None,
            path: "/app/index.html".to_string(),
            json: false,
        }
    }
}

/// Arguments for the watch command
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory holding the storage shared by every watching terminal
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Path of this page
    #[arg(short, long, default_value = "/app/index.html")]
    pub path: String,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Parses a duration such as `500ms`, `30s`, `45m`, `1h` or a bare number
/// of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("時間が指定されていません".to_string());
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: u64 = number
        .parse()
        .map_err(|_| format!("時間の形式が不正です: {s}"))?;

    let duration = match unit {
        "" | "s" => Some(Duration::from_secs(value)),
        "ms" => Some(Duration::from_millis(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        other => return Err(format!("不明な時間単位です: {other} (ms, s, m, h)")),
    };
    match duration {
        Some(duration) if duration <= MAX_CONFIG_DURATION => Ok(duration),
        _ => Err(format!(
            "時間が長すぎます: {s} (最大 {}日)",
            MAX_CONFIG_DURATION.as_secs() / 86_400
        )),
    }
}

/// Validates the login path.
///
/// - Must not be empty
/// - Must not contain whitespace
fn validate_login_path(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Err("ログインページのパスは空にできません".to_string());
    }
    if s.chars().any(char::is_whitespace) {
        return Err("ログインページのパスに空白は使えません".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
