//! pman: interactive background process manager
//!
//! Commands:
//! - `bg <program> [args]` launch in the background
//! - `bglist` list tracked processes
//! - `bgkill|bgstop|bgstart <pid>` kill, stop or continue a tracked process
//! - `pstat <pid>` show runtime and context switch statistics

use anyhow::{Context, Result};
use std::io;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pman::config;
use pman::shell::Shell;

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: pman failed: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config_path = config::config_path();
    let loaded = config::load_config(&config_path)?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    init_logging(&config.logging.level)?;
    if found {
        info!("Configuration loaded from {config_path}");
    } else {
        warn!("Config file not found at {config_path}, using defaults");
    }

    let mut shell = Shell::new(&config);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let stderr = io::stderr();
    shell
        .run(stdin.lock(), &mut stdout.lock(), &mut stderr.lock())
        .context("Failed to read command input")?;

    info!(
        "Input closed, leaving {} background processes running",
        shell.registry().len()
    );
    Ok(())
}

fn init_logging(default_level: &str) -> Result<()> {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .with_context(|| format!("Invalid log level {default_level}"))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}
