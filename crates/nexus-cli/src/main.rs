//! Nexus CLI - policy-gated tool gateway for AI agents.
//!
//! `nexus serve` speaks JSON-RPC on stdin/stdout, so everything human-facing
//! (banner, logs, confirmation prompts) goes to stderr or the terminal.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nexus_config::Config;
use tracing::warn;

mod commands;
mod theme;

use commands::{install, serve, tools};

/// Nexus - policy-gated infrastructure tools over stdio
#[derive(Debug, Parser)]
#[command(name = "nexus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "nexus.yaml", env = "NEXUS_CONFIG")]
    config: PathBuf,

    /// Block tools whose names look mutating
    #[arg(long, global = true)]
    safe_mode: bool,

    /// Log format: pretty (default), compact or json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve tools over stdio (default)
    Serve,

    /// Install a plugin bundle from a directory, archive, file or URL
    Install {
        /// Plugin source
        source: String,
        /// Plugins directory (defaults to `modules.plugins.dir`)
        #[arg(long)]
        plugins_dir: Option<String>,
    },

    /// List every tool and its policy status
    Tools {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Load the config, apply flag overrides and start logging.
fn load_config(cli: &Cli) -> Config {
    let (mut config, load_error) = Config::load_or_default(&cli.config);
    if cli.safe_mode {
        config.server.safe_mode = true;
    }

    let format = match cli.log_format.as_str() {
        "json" => nexus_telemetry::LogFormat::Json,
        "compact" => nexus_telemetry::LogFormat::Compact,
        _ => nexus_telemetry::LogFormat::Pretty,
    };
    let log_config =
        nexus_telemetry::LogConfig::from_level_name(&config.server.log_level).with_format(format);
    if let Err(e) = nexus_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Some(e) = load_error {
        warn!(path = %cli.config.display(), error = %e, "failed to load config, using defaults");
    }
    if config.server.safe_mode {
        warn!("safe mode enabled (read-only)");
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run(&config).await,
        Commands::Install {
            source,
            plugins_dir,
        } => install::run(&config, source, plugins_dir).await,
        Commands::Tools { json } => tools::run(&config, json),
    }
}
