//! Display utilities for the idle-logout CLI.
//!
//! This module provides formatted output for:
//! - Configuration and validation results
//! - Simulation timelines
//! - The interactive warning prompt of the watch command

use std::io::Write;
use std::path::Path;

use crate::session::WarningPrompt;
use crate::types::{ConfigError, GuardConfig, GuardState, PromptAction};

use super::simulate::{EventKind, SimulationReport};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the effective configuration.
    pub fn show_config(config: &GuardConfig) {
        println!("無操作ログアウト設定");
        println!("─────────────────────────────");
        println!(
            "無操作の上限:     {}",
            Self::format_offset(config.inactivity_limit.as_millis() as u64)
        );
        println!(
            "警告の表示:       ログアウトの{}秒前",
            config.warning_lead_time.as_secs()
        );
        println!(
            "警告までの時間:   {}",
            Self::format_offset(config.warning_delay().as_millis() as u64)
        );
        println!("ログインページ:   {}", config.login_path);
        println!("ブロードキャスト: {}", config.logout_channel_key);
        println!("認証トークン:     {}", config.credential_key);
    }

    /// Shows the result of validating the configuration.
    pub fn show_validation(problems: &[ConfigError]) {
        if problems.is_empty() {
            println!("* 設定に問題はありません");
            return;
        }
        println!("! 設定に{}件の問題があります", problems.len());
        for problem in problems {
            println!("  - {}", problem);
        }
    }

    /// Shows a simulation timeline and the final state of every tab.
    pub fn show_simulation(report: &SimulationReport) {
        println!("シミュレーション結果");
        println!("─────────────────────────────");

        for entry in &report.timeline {
            let what = match entry.kind {
                EventKind::Activity => "操作".to_string(),
                EventKind::StaySignedIn => {
                    format!("「{}」を選択", PromptAction::StaySignedIn.label())
                }
                EventKind::SignOutNow => {
                    format!("「{}」を選択", PromptAction::SignOutNow.label())
                }
                EventKind::WarningShown => format!(
                    "警告を表示 (残り{})",
                    entry.detail.as_deref().unwrap_or("?")
                ),
                EventKind::WarningHidden => "警告を閉じました".to_string(),
                EventKind::Redirected => format!(
                    "{} へ移動",
                    entry.detail.as_deref().unwrap_or("?")
                ),
            };
            println!(
                "{}  タブ{}  {}",
                Self::format_offset(entry.at_ms),
                entry.tab + 1,
                what
            );
        }
        if report.timeline.is_empty() {
            println!("(イベントなし)");
        }

        println!();
        for outcome in &report.tabs {
            println!(
                "タブ{}: {}",
                outcome.tab + 1,
                Self::state_label(outcome.status.state)
            );
        }
        println!(
            "認証トークン: {}",
            if report.credential_present {
                "残っています"
            } else {
                "削除されました"
            }
        );
    }

    /// Shows the banner of the watch command.
    pub fn show_watch_started(config: &GuardConfig, state_dir: &Path) {
        println!("* 監視を開始しました");
        println!(
            "  {}操作がないとログアウトします",
            Self::format_offset(config.inactivity_limit.as_millis() as u64)
        );
        println!("  共有ディレクトリ: {}", state_dir.display());
        println!("  Enter: 操作  s + Enter: ログイン継続  q + Enter: ログアウト");
    }

    /// Shows that the guard stays inactive on the login page.
    pub fn show_login_page(path: &str) {
        println!("{} はログインページのため監視しません", path);
    }

    /// Shows the page the session was redirected to.
    pub fn show_redirected(destination: &str) {
        println!();
        println!("[] ログアウトしました: {} へ移動します", destination);
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    /// Formats a millisecond offset as `H:MM:SS`, with milliseconds when non-zero.
    pub fn format_offset(millis: u64) -> String {
        let total_seconds = millis / 1000;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        match millis % 1000 {
            0 => format!("{}:{:02}:{:02}", hours, minutes, seconds),
            ms => format!("{}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms),
        }
    }

    fn state_label(state: GuardState) -> &'static str {
        match state {
            GuardState::Inactive => "監視なし",
            GuardState::Watching => "監視中",
            GuardState::Warning => "警告表示中",
            GuardState::Terminated => "ログアウト済み",
        }
    }
}

// ============================================================================
// TerminalPrompt
// ============================================================================

/// Warning prompt rendered on stdout.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WarningPrompt for TerminalPrompt {
    fn show(&self, seconds: u64) {
        println!();
        println!("! まもなくセッションが終了します");
        println!(
            "  s: {}  q: {}",
            PromptAction::StaySignedIn.label(),
            PromptAction::SignOutNow.label()
        );
        self.update(seconds);
    }

    fn update(&self, seconds: u64) {
        print!("\r  残り {:>3} 秒", seconds);
        let _ = std::io::stdout().flush();
    }

    fn hide(&self) {
        println!();
        println!("  警告を閉じました");
    }
}

// ============================================================================
// Tests
// ============================================================================
