//! Real-time guard for one terminal "tab".
//!
//! Terminals started with the same state directory share one storage file
//! and see each other's logouts through a [`FileChannel`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::activity::{ActivityKind, EventTarget};
use crate::clock::TokioClock;
use crate::session::{Navigator, PageContext, SessionGuard};
use crate::storage::{FileChannel, FileStore, KeyValueStore, MemoryStore};
use crate::types::{GuardConfig, PromptAction};

use super::display::{Display, TerminalPrompt};
use super::WatchArgs;

/// Name of the shared storage file inside the state directory.
pub const STORAGE_FILE: &str = "storage.json";

/// Navigator that hands the destination to the watch loop.
#[derive(Debug)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, path: &str) {
        if self.tx.send(path.to_string()).is_err() {
            debug!(path, "watch loop already finished, navigation dropped");
        }
    }
}

/// Default directory shared by watching terminals.
pub fn default_state_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("idle-logout"))
        .context("状態ディレクトリを決定できませんでした")
}

/// One line of terminal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchInput {
    Activity,
    Action(PromptAction),
}

impl WatchInput {
    /// `s` stays signed in, `q` signs out, anything else is a key press.
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "s" | "S" => WatchInput::Action(PromptAction::StaySignedIn),
            "q" | "Q" => WatchInput::Action(PromptAction::SignOutNow),
            _ => WatchInput::Activity,
        }
    }
}

/// Runs the watch command until the session ends, stdin closes or Ctrl-C.
pub async fn run(config: GuardConfig, args: &WatchArgs) -> Result<()> {
    let state_dir = match &args.state_dir {
        Some(dir) => dir.clone(),
        None => default_state_dir()?,
    };
    std::fs::create_dir_all(&state_dir).with_context(|| {
        format!(
            "状態ディレクトリを作成できませんでした: {}",
            state_dir.display()
        )
    })?;

    let store = Arc::new(FileStore::new(state_dir.join(STORAGE_FILE)));
    if store.get(&config.credential_key)?.is_none() {
        // A fresh state directory starts signed in.
        store.set(&config.credential_key, &Uuid::new_v4().to_string())?;
        info!(key = %config.credential_key, "credential token created");
    }

    let (nav_tx, mut nav_rx) = mpsc::unbounded_channel();
    let events = Arc::new(EventTarget::new());
    let page = PageContext {
        path: args.path.clone(),
        clock: Arc::new(TokioClock::new()),
        activity: events.clone(),
        prompt: Arc::new(TerminalPrompt::new()),
        navigator: Arc::new(ChannelNavigator::new(nav_tx)),
        persistent: store.clone(),
        transient: Arc::new(MemoryStore::new()),
        channel: Arc::new(FileChannel::new(store)),
    };

    let guard = SessionGuard::install(config, page);
    if !guard.is_active() {
        Display::show_login_page(&args.path);
        return Ok(());
    }
    Display::show_watch_started(guard.config(), &state_dir);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let destination = loop {
        tokio::select! {
            // Navigation first: a redirect ends the page even if input is pending.
            biased;
            destination = nav_rx.recv() => break destination,
            line = lines.next_line() => {
                match line.context("標準入力の読み込みに失敗しました")? {
                    Some(line) => match WatchInput::parse(&line) {
                        WatchInput::Activity => events.dispatch(ActivityKind::KeyDown),
                        WatchInput::Action(action) => guard.prompt_action(action),
                    },
                    None => break None,
                }
            }
            _ = tokio::signal::ctrl_c() => break None,
        }
    };

    guard.detach();
    if let Some(destination) = destination {
        Display::show_redirected(&destination);
    }
    Ok(())
}
