// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent backend inspection commands
//!
//! Commands: list, status, health

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use spark_core::domain::execution::{AgentBackend, ExecutionId};

use super::{agent_backend, load_config};
use crate::render::format_status;

#[derive(Subcommand)]
pub enum ExecutionsCommand {
    /// List executions tracked by the backend
    List {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the status and reasoning of one execution
    Status {
        /// Execution ID
        #[arg(value_name = "EXECUTION_ID")]
        execution_id: String,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the backend is reachable
    Health,
}

pub async fn handle_command(
    command: ExecutionsCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_override)?;
    let backend = agent_backend(&config)?;

    match command {
        ExecutionsCommand::List { json } => list(&backend, json).await,
        ExecutionsCommand::Status { execution_id, json } => {
            status(&backend, ExecutionId::new(execution_id), json).await
        }
        ExecutionsCommand::Health => health(&backend).await,
    }
}

async fn list(backend: &dyn AgentBackend, json: bool) -> Result<()> {
    let executions = backend
        .list_executions()
        .await
        .context("Failed to list executions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&executions)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!("{}", "No executions found".yellow());
        return Ok(());
    }

    println!("{} executions:", executions.len());
    for exec in executions {
        println!(
            "  {} - {} - started {}",
            exec.execution_id,
            format_status(exec.status.as_str()),
            exec.start_time.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

async fn status(backend: &dyn AgentBackend, id: ExecutionId, json: bool) -> Result<()> {
    let execution = backend
        .get_execution(&id)
        .await
        .with_context(|| format!("Failed to fetch execution {}", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
        return Ok(());
    }

    println!("Execution {}", execution.execution_id);
    println!("  Status: {}", format_status(execution.status.as_str()));
    if let Some(agent) = &execution.current_agent {
        println!("  Current agent: {}", agent);
    }

    if !execution.reasoning_chain.is_empty() {
        println!("  Reasoning:");
        for (step, text) in execution.reasoning_chain.iter().enumerate() {
            println!("    {}. {}", step + 1, text);
        }
    }
    if let Some(proposal) = &execution.final_proposal {
        println!("  Final proposal:\n{}", indent(&serde_json::to_string_pretty(proposal)?));
    }
    if let Some(risk) = &execution.risk_assessment {
        println!("  Risk assessment:\n{}", indent(&serde_json::to_string_pretty(risk)?));
    }
    if !execution.error_messages.is_empty() {
        println!("  {}", format!("Errors: {}", execution.error_messages.join(", ")).red());
    }

    Ok(())
}

async fn health(backend: &dyn AgentBackend) -> Result<()> {
    match backend.health().await {
        Ok(health) => {
            println!(
                "{}",
                format!("✓ Backend is {}", health.status).green()
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", format!("✗ Backend unreachable: {}", e).red());
            Err(e).context("Backend health check failed")
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
