use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use corretagem::cli::Cli;
use corretagem::config::AppConfig;
use corretagem::dispatcher::dispatch_command;
use corretagem::importers::CancellationToken;

/// Exit status after a second Ctrl+C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = run(cli).await {
        error!("{:#}", err);
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, source) = AppConfig::load(cli.config.as_deref())?;
    let config = config.with_overrides(cli.command.overrides());

    let log_file = init_logging(&config, cli.no_color)?;
    match source {
        Some(path) => info!("Using config {:?}", path),
        None => info!("No config file found, using defaults"),
    }
    info!("Logging to {:?}", log_file);

    let token = CancellationToken::new();
    install_interrupt_handler(token.clone());

    let quiet = cli.quiet;
    let command = cli.command;
    tokio::task::spawn_blocking(move || dispatch_command(command, &config, &token, quiet))
        .await
        .context("Command task failed")?
}

/// First Ctrl+C stops between documents; the second aborts.
fn install_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, stopping after the current document (Ctrl+C again to abort)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Second interrupt, aborting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
}

/// stderr plus `extracao_YYYYMMDD_HHMMSS.log` in the logs folder.
fn init_logging(config: &AppConfig, no_color: bool) -> Result<PathBuf> {
    fs::create_dir_all(&config.logs_folder)
        .with_context(|| format!("Failed to create logs folder {:?}", config.logs_folder))?;
    let path = config
        .logs_folder
        .join(format!("extracao_{}.log", Local::now().format("%Y%m%d_%H%M%S")));
    let file = File::create(&path).with_context(|| format!("Failed to create log file {:?}", path))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.filter_level()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(!no_color)
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(path)
}
