// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Spark CLI
//!
//! The `spark` binary is a terminal front end for the Spark DeFi agent.
//!
//! ## Commands
//!
//! - `spark chat [MESSAGE]` - Send a request to the agent and follow its reasoning
//! - `spark executions list|status|health` - Inspect runs tracked by the backend
//! - `spark dashboard portfolio|balances|executions|...` - Read the hosted records
//! - `spark wallet status|connect|switch-network|watch` - Wallet connection
//! - `spark config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use spark_cli::commands::{
    self, ChatArgs, ConfigCommand, DashboardCommand, ExecutionsCommand, WalletCommand,
};

/// Spark - talk to the DeFi agent from your terminal
#[derive(Parser)]
#[command(name = "spark")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SPARK_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SPARK_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    #[command(name = "chat")]
    Chat {
        #[command(flatten)]
        args: ChatArgs,
    },

    /// Executions tracked by the agent backend
    #[command(name = "executions")]
    Executions {
        #[command(subcommand)]
        command: ExecutionsCommand,
    },

    /// Portfolio, executions and transactions from the data service
    #[command(name = "dashboard")]
    Dashboard {
        #[command(subcommand)]
        command: DashboardCommand,
    },

    /// Wallet connection and network
    #[command(name = "wallet")]
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; variables may come from the shell.
    let dotenv = dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    match cli.command {
        Some(Commands::Chat { args }) => commands::chat::handle_command(args, cli.config).await,
        Some(Commands::Executions { command }) => {
            commands::executions::handle_command(command, cli.config).await
        }
        Some(Commands::Dashboard { command }) => {
            commands::dashboard::handle_command(command, cli.config).await
        }
        Some(Commands::Wallet { command }) => {
            commands::wallet::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
