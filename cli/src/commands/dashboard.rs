// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dashboard commands over the hosted data service
//!
//! Commands: portfolio, create-portfolio, balances, executions, execution,
//! reasoning, transactions, overview
//!
//! Every command needs the data service URL and anon key; without them the
//! command fails before any request is made.

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use spark_core::application::dashboard::{
    BalancesQuery, ExecutionDetailsQuery, ExecutionsQuery, LiveReasoning, LiveRows,
    LiveTransactions, PortfolioOverviewQuery, PortfolioQuery, Resource, TransactionsQuery,
};
use spark_core::application::DataOperations;
use spark_core::domain::config::SparkConfig;
use spark_core::infrastructure::event_bus::EventBusError;
use spark_core::infrastructure::{PostgrestClient, RealtimeClient};

use super::load_config;
use crate::render::{
    format_status, render_balance, render_execution, render_reasoning, render_transaction,
};

#[derive(Subcommand)]
pub enum DashboardCommand {
    /// Show the portfolio owned by a wallet address
    Portfolio {
        /// Wallet address (default: chat.wallet_address from config)
        #[arg(long, value_name = "ADDRESS")]
        wallet: Option<String>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Create (or update) the portfolio for a wallet address
    CreatePortfolio {
        /// Owner user id (default: chat.user_id from config)
        #[arg(long)]
        user_id: Option<String>,

        /// Wallet address (default: chat.wallet_address from config)
        #[arg(long, value_name = "ADDRESS")]
        wallet: Option<String>,

        /// Chain id
        #[arg(long)]
        chain_id: Option<i64>,
    },

    /// List balances of a portfolio
    Balances {
        #[arg(value_name = "PORTFOLIO_ID")]
        portfolio_id: String,

        #[arg(long)]
        json: bool,
    },

    /// List recent executions of a portfolio
    Executions {
        #[arg(value_name = "PORTFOLIO_ID")]
        portfolio_id: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Show an execution with its decisions, reasoning and risk assessments
    Execution {
        #[arg(value_name = "EXECUTION_ID")]
        execution_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Show the reasoning of an execution
    Reasoning {
        #[arg(value_name = "EXECUTION_ID")]
        execution_id: String,

        /// Keep printing new steps as they are recorded
        #[arg(short, long)]
        follow: bool,
    },

    /// List executed transactions of a portfolio
    Transactions {
        #[arg(value_name = "PORTFOLIO_ID")]
        portfolio_id: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep printing new transactions as they are recorded
        #[arg(short, long)]
        follow: bool,
    },

    /// Portfolio with balances, recent executions and transactions
    Overview {
        #[arg(value_name = "PORTFOLIO_ID")]
        portfolio_id: String,

        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(
    command: DashboardCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_override)?;
    let ops = data_operations(&config)?;

    match command {
        DashboardCommand::Portfolio { wallet, json } => {
            let wallet = wallet.unwrap_or_else(|| config.chat.wallet_address.clone());
            portfolio(ops, wallet, json).await
        }
        DashboardCommand::CreatePortfolio {
            user_id,
            wallet,
            chain_id,
        } => {
            let user_id = user_id.unwrap_or_else(|| config.chat.user_id.clone());
            let wallet = wallet.unwrap_or_else(|| config.chat.wallet_address.clone());
            create_portfolio(ops, &user_id, &wallet, chain_id).await
        }
        DashboardCommand::Balances { portfolio_id, json } => {
            let mut query = BalancesQuery::balances(ops);
            let resource = query.set_key(Some(portfolio_id)).await;
            print_rows(resource, json, "No balances found", render_balance)
        }
        DashboardCommand::Executions {
            portfolio_id,
            limit,
            json,
        } => {
            let mut query = ExecutionsQuery::executions(ops, limit);
            let resource = query.set_key(Some(portfolio_id)).await;
            print_rows(resource, json, "No executions found", render_execution)
        }
        DashboardCommand::Execution { execution_id, json } => {
            execution(ops, execution_id, json).await
        }
        DashboardCommand::Reasoning {
            execution_id,
            follow,
        } => {
            let live = LiveReasoning::reasoning(ops);
            follow_rows(live, execution_id, follow, "No reasoning recorded", render_reasoning).await
        }
        DashboardCommand::Transactions {
            portfolio_id,
            limit,
            follow,
        } => {
            if follow {
                let live = LiveTransactions::transactions(ops);
                follow_rows(live, portfolio_id, true, "No transactions found", render_transaction)
                    .await
            } else {
                let mut query = TransactionsQuery::transactions(ops, limit);
                let resource = query.set_key(Some(portfolio_id)).await;
                print_rows(resource, false, "No transactions found", render_transaction)
            }
        }
        DashboardCommand::Overview { portfolio_id, json } => {
            overview(ops, portfolio_id, json).await
        }
    }
}

/// Build the data operations from configuration, failing when the data
/// service is not configured.
pub fn data_operations(config: &SparkConfig) -> Result<DataOperations> {
    let data_config = config.data_service()?;
    let data = PostgrestClient::from_config(data_config)
        .context("Failed to initialize data service client")?;
    let feed = RealtimeClient::from_config(data_config)
        .context("Failed to initialize realtime client")?;
    Ok(DataOperations::new(Arc::new(data), Some(Arc::new(feed))))
}

fn into_result<T>(resource: &Resource<T>) -> Result<&T> {
    match &resource.error {
        Some(error) => Err(anyhow!("{}", error)),
        None => Ok(&resource.data),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_rows<T: Serialize>(
    resource: &Resource<Vec<T>>,
    json: bool,
    empty: &str,
    render: fn(&T) -> String,
) -> Result<()> {
    let rows = into_result(resource)?;
    if json {
        return print_json(rows);
    }
    if rows.is_empty() {
        println!("{}", empty.yellow());
        return Ok(());
    }
    for row in rows {
        println!("{}", render(row));
    }
    Ok(())
}

async fn portfolio(ops: DataOperations, wallet: String, json: bool) -> Result<()> {
    let mut query = PortfolioQuery::portfolio(ops);
    let portfolio = into_result(query.set_key(Some(wallet.clone())).await)?;

    if json {
        return print_json(portfolio);
    }

    match portfolio {
        Some(portfolio) => {
            println!("{}", "Portfolio:".bold());
            println!("  ID: {}", portfolio.id);
            println!("  User: {}", portfolio.user_id);
            println!("  Wallet: {}", portfolio.wallet_address);
            println!("  Chain: {}", portfolio.chain_id);
        }
        None => println!(
            "{}",
            format!("No portfolio for wallet {}", wallet).yellow()
        ),
    }
    Ok(())
}

async fn create_portfolio(
    ops: DataOperations,
    user_id: &str,
    wallet: &str,
    chain_id: Option<i64>,
) -> Result<()> {
    let portfolio = ops
        .create_portfolio(user_id, wallet, chain_id)
        .await
        .context("Failed to create portfolio")?;
    println!(
        "{}",
        format!("✓ Portfolio {} ready for {}", portfolio.id, portfolio.wallet_address).green()
    );
    Ok(())
}

async fn execution(ops: DataOperations, execution_id: String, json: bool) -> Result<()> {
    let mut query = ExecutionDetailsQuery::execution_details(ops);
    let details = into_result(query.set_key(Some(execution_id.clone())).await)?;

    if json {
        return print_json(details);
    }

    let Some(execution) = &details.execution else {
        println!("{}", format!("Execution {} not found", execution_id).yellow());
        return Ok(());
    };

    println!("Execution {}", execution.execution_id);
    println!("  Portfolio: {}", execution.portfolio_id);
    println!("  Status: {}", format_status(&execution.status));

    if !details.decisions.is_empty() {
        println!("{}", "Decisions:".bold());
        for decision in &details.decisions {
            println!(
                "  {} {}: {}",
                format!("[{}]", decision.agent_name).magenta(),
                decision.decision_type,
                decision.reasoning
            );
        }
    }

    if !details.reasoning.is_empty() {
        println!("{}", "Reasoning:".bold());
        for step in &details.reasoning {
            println!("{}", render_reasoning(step));
        }
    }

    if !details.risks.is_empty() {
        println!("{}", "Risk assessments:".bold());
        for risk in &details.risks {
            let verdict = if risk.safe { "safe".green() } else { "unsafe".red() };
            println!("  {} score {:.1} ({})", risk.protocol, risk.risk_score, verdict);
        }
    }

    Ok(())
}

async fn overview(ops: DataOperations, portfolio_id: String, json: bool) -> Result<()> {
    let mut query = PortfolioOverviewQuery::portfolio_overview(ops);
    let overview = into_result(query.set_key(Some(portfolio_id.clone())).await)?;

    if json {
        return print_json(overview);
    }

    match &overview.portfolio {
        Some(portfolio) => println!(
            "{} {} ({})",
            "Portfolio".bold(),
            portfolio.id,
            portfolio.wallet_address
        ),
        None => println!("{}", format!("Portfolio {} not found", portfolio_id).yellow()),
    }

    println!("{}", "Balances:".bold());
    for balance in &overview.balances {
        println!("{}", render_balance(balance));
    }
    println!("{}", "Recent executions:".bold());
    for execution in &overview.recent_executions {
        println!("{}", render_execution(execution));
    }
    println!("{}", "Recent transactions:".bold());
    for tx in &overview.recent_transactions {
        println!("{}", render_transaction(tx));
    }

    Ok(())
}

/// Print the current rows, then (with `follow`) every row pushed by the
/// change feed until Ctrl-C.
async fn follow_rows<T>(
    mut live: LiveRows<T>,
    key: String,
    follow: bool,
    empty: &str,
    render: fn(&T) -> String,
) -> Result<()>
where
    T: Clone + Send + Sync + serde::de::DeserializeOwned + 'static,
{
    live.set_key(Some(key)).await;
    let snapshot = live.snapshot();
    if let Some(error) = snapshot.error {
        return Err(anyhow!("{}", error));
    }

    if snapshot.data.is_empty() {
        println!("{}", empty.yellow());
    }
    for row in &snapshot.data {
        println!("{}", render(row));
    }

    if !follow {
        return Ok(());
    }

    println!("{}", "Following new rows (Ctrl-C to stop)...".dimmed());
    let mut printed = snapshot.data.len();
    let mut updates = live.updates();

    loop {
        tokio::select! {
            update = updates.recv() => {
                if update == Err(EventBusError::Closed) {
                    break;
                }
                let rows = live.snapshot().data;
                for row in rows.iter().skip(printed) {
                    println!("{}", render(row));
                }
                printed = rows.len();
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
