//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for debuginfo.

use clap::{Parser, Subcommand};

/// debuginfo - Live device, process and environment overlay
///
/// Samples host facts every second and renders them as a single
/// scrolling screen, with controls to pause, refresh and export.
#[derive(Parser, Debug)]
#[command(name = "debuginfo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the interactive overlay (p pause/resume, r refresh, s export, q quit)
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "DEBUGINFO_CONFIG")]
        config: Option<String>,

        /// Override the refresh period in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Start with the refresh timer paused
        #[arg(long)]
        paused: bool,

        /// Exit after this many timer refreshes
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Capture and print a single snapshot
    Snapshot {
        /// Path to configuration file
        #[arg(short, long, env = "DEBUGINFO_CONFIG")]
        config: Option<String>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Also export the rendered screen to the export directory
        #[arg(long)]
        export: bool,
    },

    /// Run the secure storage write/read probe and report the result
    Probe {
        /// Path to configuration file
        #[arg(short, long, env = "DEBUGINFO_CONFIG")]
        config: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

impl Commands {
    /// Configuration file named on the command line, if any
    pub fn config_path(&self) -> Option<&str> {
        match self {
            Commands::Run { config, .. }
            | Commands::Snapshot { config, .. }
            | Commands::Probe { config } => config.as_deref(),
            Commands::Version | Commands::Config { .. } => None,
        }
    }
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
