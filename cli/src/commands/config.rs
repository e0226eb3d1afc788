// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use spark_core::domain::config::SparkConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./spark-config.yaml)
        #[arg(short, long, default_value = "./spark-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(output, examples, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = SparkConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SPARK_CONFIG_PATH: {}",
            std::env::var("SPARK_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./spark-config.yaml");
        println!("  4. ~/.spark/config.yaml");
        println!("  5. /etc/spark/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Agent Backend:".bold());
    println!("  URL: {}", config.backend.url);
    println!("  Poll interval: {:?}", config.backend.poll_interval);
    println!("  Request timeout: {:?}", config.backend.request_timeout);
    println!();

    println!("{}", "Chat:".bold());
    println!("  Wallet address: {}", config.chat.wallet_address);
    println!("  User ID: {}", config.chat.user_id);
    println!();

    println!("{}", "Data Service:".bold());
    match &config.data_service {
        Some(data) => {
            println!("  URL: {}", data.url);
            println!("  Anon key: {}", mask(&data.anon_key));
        }
        None => println!("  {}", "(not configured; dashboard commands unavailable)".dimmed()),
    }
    println!();

    println!("{}", "Wallet:".bold());
    println!(
        "  RPC URL: {}",
        config.wallet.rpc_url.as_deref().unwrap_or("(not installed)")
    );
    println!("  Watch interval: {:?}", config.wallet.watch_interval);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config =
        SparkConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    for (surface, status) in readiness(&config) {
        match status {
            Ok(detail) => println!("  {} {}: {}", "✓".green(), surface, detail),
            Err(hint) => println!("  {} {}: {}", "!".yellow(), surface, hint.yellow()),
        }
    }

    Ok(())
}

/// Which command groups the configuration can drive, with a hint for the
/// ones it cannot.
fn readiness(config: &SparkConfig) -> Vec<(&'static str, Result<String, String>)> {
    let dashboard = match config.data_service() {
        Ok(data) => Ok(data.url.to_string()),
        Err(_) => Err(
            "not configured (set data_service or SUPABASE_URL / SUPABASE_ANON_KEY)".to_string(),
        ),
    };
    let wallet = match &config.wallet.rpc_url {
        Some(url) => Ok(url.to_string()),
        None => Err("not installed (set wallet.rpc_url or SPARK_WALLET_RPC_URL)".to_string()),
    };
    vec![
        ("chat", Ok(config.backend.url.to_string())),
        ("dashboard", dashboard),
        ("wallet", wallet),
    ]
}

async fn generate(output: PathBuf, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            output.display()
        );
    }

    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };
    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );
    if !with_examples {
        println!(
            "{}",
            "  Dashboard commands also need data_service (or SUPABASE_URL / SUPABASE_ANON_KEY)."
                .dimmed()
        );
    }

    Ok(())
}

/// Show only the first few characters of a key.
fn mask(key: &str) -> String {
    let visible: String = key.chars().take(6).collect();
    format!("{}…", visible)
}
