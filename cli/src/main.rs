// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # DocGate CLI
//!
//! The `docgate` binary serves the permission-aware document assistant API
//! and offers operator tooling around it.
//!
//! ## Commands
//!
//! - `docgate serve` - Run the HTTP API
//! - `docgate config show|validate|generate` - Configuration management
//! - `docgate permissions aggregate|check` - Offline permission inspection

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use docgate::commands::{self, ConfigCommand, PermissionsCommand};
use docgate::server;
use docgate_core::domain::gateway_config::GatewayConfigManifest;

/// DocGate - Permission-aware answers over SharePoint documents
#[derive(Parser)]
#[command(name = "docgate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DOCGATE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(long, global = true, env = "DOCGATE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    #[command(name = "serve")]
    Serve {
        /// Bind address (default: from configuration)
        #[arg(long)]
        host: Option<String>,

        /// HTTP port (default: from configuration)
        #[arg(long)]
        port: Option<u16>,

        /// JSON array of documents to index before serving
        #[arg(long, value_name = "FILE")]
        documents: Option<PathBuf>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Inspect document permissions offline
    #[command(name = "permissions")]
    Permissions {
        #[command(subcommand)]
        command: PermissionsCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the manifest when one can be read; loading
    // errors are reported by the command itself.
    let logging = GatewayConfigManifest::load_or_default(cli.config.clone())
        .ok()
        .and_then(|config| config.spec.observability)
        .and_then(|observability| observability.logging);
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let json = logging.as_ref().map(|l| l.format == "json").unwrap_or(false);

    server::init_logging(&level, json).context("Failed to initialize logging")?;

    match cli.command {
        Some(Commands::Serve { host, port, documents }) => {
            server::start_server(cli.config, host, port, documents).await
        }
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Permissions { command }) => {
            commands::permissions::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
