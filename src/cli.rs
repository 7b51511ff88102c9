//! Command-line interface module for downsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Configuration loading and startup validation
//! - Logging and notifier setup
//! - Running the watch until Ctrl+C

use crate::config::AppConfig;
use crate::coordinator::WatchCoordinator;
use crate::logging;
use crate::notifier::{DesktopNotifier, Notifier, SilentNotifier};
use crate::output::OutputFormatter;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Watch the Downloads directory and sort new files into category directories.
#[derive(Debug, Parser)]
#[command(name = "downsort", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Home directory holding Downloads and the category directories.
    /// Overrides checker.home_directory.
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Do not send desktop notifications (log lines are still written).
    #[arg(long)]
    pub no_notify: bool,

    /// Validate configuration and directory layout, print the routing table and exit.
    #[arg(long)]
    pub check: bool,
}

/// Runs the application for parsed arguments.
///
/// Startup problems (configuration, missing watch root, subscription failure)
/// are returned as errors; once watching, per-file problems are only notified
/// and logged.
pub fn run_cli(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Error loading configuration")?;
    if let Some(home) = cli.home {
        config = config.with_home_directory(home);
    }
    let home = config.home_directory()?.to_path_buf();

    let log_file = config.log_file();
    logging::init(&config.logging, Some(&log_file))
        .with_context(|| format!("Error opening log file {}", log_file.display()))?;

    let notifier: Arc<dyn Notifier> = if config.notifications.enabled && !cli.no_notify {
        Arc::new(DesktopNotifier::new(
            config.notifications.icon.clone(),
            config.notifications.timeout_ms,
        ))
    } else {
        Arc::new(SilentNotifier)
    };

    let mut coordinator = WatchCoordinator::new(&config, notifier)?;
    print_routing(&coordinator, &home);

    if cli.check {
        return check_layout(&coordinator, &home);
    }

    let (interrupt_tx, interrupt_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("Error installing Ctrl+C handler")?;

    OutputFormatter::info(&format!(
        "Watching {} (Ctrl+C to stop)",
        coordinator.watch_root().display()
    ));
    tracing::info!("watching {}", coordinator.watch_root().display());

    coordinator.run(&interrupt_rx)?;

    tracing::info!("stopped");
    OutputFormatter::summary_table(
        &coordinator.dispatcher().summary(),
        coordinator.dispatcher().failures(),
    );
    Ok(())
}

fn print_routing(coordinator: &WatchCoordinator, home: &Path) {
    let rows: Vec<_> = coordinator
        .dispatcher()
        .watchers()
        .iter()
        .map(|watcher| {
            let category = watcher.category();
            (
                category.name().to_string(),
                home.join(category.destination()).display().to_string(),
                category.extensions().len(),
            )
        })
        .collect();
    OutputFormatter::routing_table(&rows);

    for watcher in coordinator.dispatcher().watchers() {
        let destination = watcher.destination_root();
        if !destination.is_dir() {
            let message = format!(
                "Destination {} does not exist; {} files will fail to move",
                destination.display(),
                watcher.category().name()
            );
            tracing::warn!("{message}");
            OutputFormatter::warning(&message);
        }
    }
}

fn check_layout(coordinator: &WatchCoordinator, home: &Path) -> Result<()> {
    let watch_root = coordinator.watch_root();
    if !watch_root.is_dir() {
        OutputFormatter::error(&format!("{} is not a directory", watch_root.display()));
        anyhow::bail!("Watch root {} is missing", watch_root.display());
    }
    OutputFormatter::success(&format!(
        "Configuration OK, home directory {}",
        home.display()
    ));
    Ok(())
}
