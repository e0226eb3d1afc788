// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Wallet commands
//!
//! Commands: status, connect, switch-network, watch

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use spark_core::application::WalletConnector;
use spark_core::domain::config::SparkConfig;
use spark_core::domain::wallet::{ProviderEvent, WalletError, WalletProvider, WalletState};
use spark_core::infrastructure::JsonRpcWalletProvider;

use super::load_config;
use crate::render::render_connection;

#[derive(Subcommand)]
pub enum WalletCommand {
    /// Show account, network and balance
    Status,

    /// Request account access from the wallet
    Connect,

    /// Switch the wallet to Base Sepolia (adding the network if needed)
    SwitchNetwork,

    /// Print wallet state changes until Ctrl-C
    Watch,
}

pub async fn handle_command(
    command: WalletCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_override)?;
    let (connector, provider) = wallet_connector(&config);

    match command {
        WalletCommand::Status => status(&connector, provider.as_ref()).await,
        WalletCommand::Connect => connect(&connector).await,
        WalletCommand::SwitchNetwork => switch_network(&connector).await,
        WalletCommand::Watch => watch(&config, &connector, provider).await,
    }
}

/// Connector over the configured JSON-RPC wallet, or a "not installed"
/// connector when no endpoint is configured.
pub fn wallet_connector(config: &SparkConfig) -> (WalletConnector, Option<JsonRpcWalletProvider>) {
    match &config.wallet.rpc_url {
        Some(url) => {
            let provider = JsonRpcWalletProvider::new(url.clone());
            let connector = WalletConnector::new(Some(Arc::new(provider.clone())));
            (connector, Some(provider))
        }
        None => (WalletConnector::new(None), None),
    }
}

fn print_state(state: &WalletState) {
    println!("Wallet: {}", render_connection(state));
    if !state.balance.is_empty() {
        println!("  Balance: {} ETH", state.balance);
    }
    if !state.error.is_empty() {
        println!("  {}", state.error.red());
    }
}

async fn status(connector: &WalletConnector, provider: Option<&JsonRpcWalletProvider>) -> Result<()> {
    if let Some(provider) = provider {
        // eth_accounts only reports accounts already authorized; it never prompts.
        match provider.request("eth_accounts", json!([])).await {
            Ok(accounts) => {
                let accounts: Vec<String> = serde_json::from_value(accounts).unwrap_or_default();
                connector
                    .handle_event(ProviderEvent::AccountsChanged(accounts))
                    .await;
            }
            Err(e) => tracing::debug!("eth_accounts failed: {}", e),
        }
        if let Err(e) = connector.check_network().await {
            tracing::debug!("Network check failed: {}", e);
        }
    }
    print_state(&connector.snapshot());
    Ok(())
}

async fn connect(connector: &WalletConnector) -> Result<()> {
    match connector.connect_wallet().await {
        Ok(account) => {
            println!("{}", format!("✓ Connected {}", account).green());
            print_state(&connector.snapshot());
            Ok(())
        }
        Err(WalletError::NotInstalled) => {
            print_state(&connector.snapshot());
            println!("Set wallet.rpc_url (or SPARK_WALLET_RPC_URL) to your wallet's RPC endpoint.");
            Ok(())
        }
        Err(e) => Err(e).context("Failed to connect wallet"),
    }
}

async fn switch_network(connector: &WalletConnector) -> Result<()> {
    connector
        .switch_to_base_sepolia()
        .await
        .context("Failed to switch network")?;
    println!("{}", "✓ Wallet is on Base Sepolia".green());
    print_state(&connector.snapshot());
    Ok(())
}

async fn watch(
    config: &SparkConfig,
    connector: &WalletConnector,
    provider: Option<JsonRpcWalletProvider>,
) -> Result<()> {
    let Some(provider) = provider else {
        print_state(&connector.snapshot());
        return Ok(());
    };

    let mut updates = connector.updates();
    let watcher = provider.spawn_watcher(config.wallet.watch_interval);
    let listener = connector.listen();

    println!("{}", "Watching wallet (Ctrl-C to stop)...".dimmed());
    let mut last: Option<WalletState> = None;
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Ok(state) = update else { continue };
                if last.as_ref() != Some(&state) {
                    print_state(&state);
                    last = Some(state);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watcher.abort();
    if let Some(listener) = listener {
        listener.abort();
    }
    Ok(())
}
