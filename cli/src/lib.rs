//! Command line entry point for the gdfowsync agent.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fowsync_core::{FowSyncConfig, Orchestrator, SyncContext, Synchronizer, SystemProcessGate};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Keep Grim Dawn fog of war in sync across every character and difficulty.
#[derive(Debug, Parser)]
#[command(name = "gdfowsync", version)]
pub struct Cli {
    /// Configuration file. Defaults to `gdfowsync.toml` next to the executable.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run a single sync pass, print its report as JSON and exit.
    #[arg(long)]
    pub once: bool,

    /// Log debug output.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Install the fmt subscriber. `RUST_LOG` takes precedence over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,fowsync_core=debug,fowsync_watcher=debug,fowsync_cli=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve, load and validate the configuration named by the CLI.
pub fn load_context(cli: &Cli) -> anyhow::Result<SyncContext> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => FowSyncConfig::default_path()?,
    };
    info!("Loading configuration from: {}", path.display());

    let config = FowSyncConfig::load(&path)?;
    Ok(SyncContext::from_config(&config)?)
}

/// Run the agent until the game exits or Ctrl+C is pressed.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Arc::new(load_context(&cli)?);

    if cli.once {
        let synchronizer = Synchronizer::new(ctx);
        let report = tokio::task::spawn_blocking(move || synchronizer.run_pass())
            .await
            .context("sync pass did not complete")?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let gate = Arc::new(SystemProcessGate::new(&ctx.process_name));
    info!("Waiting on {}. Press Ctrl+C to exit...", gate.process_name());

    let summary = Orchestrator::new(ctx, gate).run(shutdown_signal()).await?;
    info!(
        "Stopped ({:?}) after {} sync pass(es)",
        summary.reason, summary.passes
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
}

/// Keep a console window open until the operator has read the error.
pub fn pause_for_operator() {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return;
    }

    eprint!("Press Enter to exit...");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    let _ = stdin.read_line(&mut line);
}
