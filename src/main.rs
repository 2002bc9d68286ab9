//! idle-logout CLI
//!
//! Checks inactivity settings, simulates the logout protocol across tabs
//! and runs a live guard in the terminal.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use idle_logout::cli::simulate::simulate;
use idle_logout::cli::{watch, Cli, Commands, Display};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Check(args)) => {
            let config = args.config.resolve()?;
            let problems = config.validate().err().unwrap_or_default();

            if args.json {
                let json = serde_json::to_string_pretty(&config)
                    .context("設定をJSONに変換できませんでした")?;
                println!("{}", json);
            } else {
                Display::show_config(&config);
                println!();
            }
            Display::show_validation(&problems);

            if args.strict && !problems.is_empty() {
                anyhow::bail!("設定が不正です ({}件)", problems.len());
            }
            config
                .ensure_schedulable()
                .context("この設定では監視を開始できません")?;
        }
        Some(Commands::Simulate(args)) => {
            let config = args.config.resolve()?;
            config
                .ensure_schedulable()
                .context("この設定ではシミュレーションできません")?;
            let report = simulate(&config, &args);
            if args.json {
                let json = serde_json::to_string_pretty(&report)
                    .context("結果をJSONに変換できませんでした")?;
                println!("{}", json);
            } else {
                Display::show_simulation(&report);
            }
        }
        Some(Commands::Watch(args)) => {
            let config = args.config.resolve()?;
            config
                .ensure_schedulable()
                .context("この設定では監視を開始できません")?;
            watch::run(config, &args).await?;
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
