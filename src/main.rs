//! debuginfo - Live device, process and environment overlay
//!
//! This is the main entry point for the debuginfo binary.
//! It samples host facts on a fixed period, renders them to the terminal,
//! and lets the user pause, refresh and export the current screen.

mod cli;
mod config;
mod error;
mod host;
mod keychain;
mod logging;
mod overlay;
mod refresh;
mod sampler;
mod types;
mod version;

use std::io;

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{Cli, Commands, ConfigSubcommand};
use crate::config::OverlayConfig;
use crate::error::{Error, Result};
use crate::keychain::KeychainProbe;
use crate::overlay::{Overlay, RunOptions};
use crate::refresh::RefreshLoop;
use crate::sampler::Sampler;

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    // Commands that don't need full logging
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone());
        }
        _ => {}
    }

    let mut config = OverlayConfig::load(cli.command.config_path())?;
    if let Commands::Run {
        interval_ms: Some(interval_ms),
        ..
    } = &cli.command
    {
        config.sampler.interval_ms = *interval_ms;
        config.validate()?;
    }

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting debuginfo"
    );

    match cli.command {
        Commands::Run { paused, ticks, .. } => {
            let options = RunOptions {
                start_paused: paused,
                ticks,
            };
            run_overlay(config, options)
        }
        Commands::Snapshot { json, export, .. } => print_snapshot(&config, json, export),
        Commands::Probe { .. } => run_probe(&config),
        Commands::Version | Commands::Config { .. } => {
            // Already handled above
            unreachable!();
        }
    }
}

/// Run the interactive overlay until quit
fn run_overlay(config: OverlayConfig, options: RunOptions) -> Result<()> {
    info!(
        interval_ms = config.sampler.interval_ms,
        backend = ?config.keychain.backend,
        probe = ?config.keychain.probe,
        format = ?config.display.format,
        "Configuration loaded"
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

    rt.block_on(async {
        let refresh = RefreshLoop::new(Sampler::from_config(&config), config.sampler.interval());
        let inputs = overlay::spawn_stdin_reader()?;
        let mut overlay = Overlay::new(
            refresh,
            config.display.clone(),
            config.export_dir(),
            io::stdout(),
        );

        let summary = overlay.run(Some(inputs), options).await?;
        info!(
            last_index = summary.last_index,
            ticks = summary.ticks,
            exports = summary.exports,
            "Overlay stopped"
        );
        Ok(())
    })
}

/// Capture and print one snapshot
fn print_snapshot(config: &OverlayConfig, json: bool, export: bool) -> Result<()> {
    let mut sampler = Sampler::from_config(config);
    let snapshot = sampler.capture(0);
    let screen = overlay::render_text(&snapshot);

    if json {
        println!("{}", overlay::render_json(&snapshot, true)?);
    } else {
        print!("{}", screen);
    }

    if export {
        let path = overlay::export_screen(&config.export_dir(), &snapshot, &screen)?;
        eprintln!("Exported to {}", path.display());
    }

    Ok(())
}

/// Run the secure storage probe once and print the outcome
fn run_probe(config: &OverlayConfig) -> Result<()> {
    let store = keychain::open_store(&config.keychain);
    let store_name = store.name();
    debug!(store = store_name, dir = %config.store_dir().display(), "Probing secure storage");

    let mut probe = KeychainProbe::new(store, config.keychain.account.clone());
    let result = probe.ensure();

    println!(
        "Keychain probe: {} (store: {}, account: {})",
        result, store_name, config.keychain.account
    );
    Ok(())
}

/// Handle config subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = OverlayConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let path = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created at: {}", path.display());
        }
        ConfigSubcommand::Validate { config } => {
            OverlayConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
