// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terminal rendering for chat messages, statuses and dashboard rows.

use colored::{ColoredString, Colorize};

use spark_core::domain::message::{ChatMessage, MessageRole};
use spark_core::domain::records::{
    AgentExecution, AgentReasoning, Balance, ExecutedTransaction, TransactionStatus,
};
use spark_core::domain::wallet::{ConnectionState, WalletState};

pub fn format_status(status: &str) -> ColoredString {
    match status {
        "running" | "pending" => status.yellow(),
        "completed" | "success" => status.green(),
        "failed" => status.red(),
        _ => status.normal(),
    }
}

pub fn format_transaction_status(status: TransactionStatus) -> ColoredString {
    match status {
        TransactionStatus::Success => "success".green(),
        TransactionStatus::Failed => "failed".red(),
        TransactionStatus::Pending => "pending".yellow(),
    }
}

/// `[HH:MM:SS] Author: text`, colored by role.
pub fn render_message(message: &ChatMessage) -> String {
    let time = message.timestamp.format("%H:%M:%S").to_string();
    let author = match message.role {
        MessageRole::User => message.author_label().cyan().bold(),
        MessageRole::Agent => message.author_label().magenta().bold(),
        MessageRole::System => message.author_label().dimmed(),
    };
    format!("{} {}: {}", format!("[{}]", time).dimmed(), author, message.text)
}

pub fn render_connection(state: &WalletState) -> ColoredString {
    match state.connection() {
        ConnectionState::NotInstalled => "wallet not installed".red(),
        ConnectionState::Disconnected => "disconnected".normal(),
        ConnectionState::Connecting => "connecting...".yellow(),
        ConnectionState::ConnectedWrongNetwork => {
            format!("{} (wrong network)", state.short_account()).yellow()
        }
        ConnectionState::ConnectedCorrectNetwork => {
            format!("{} on Base Sepolia", state.short_account()).green()
        }
    }
}

pub fn render_balance(balance: &Balance) -> String {
    format!(
        "  {:<8} {:>14.4}  {}",
        balance.asset.bold(),
        balance.amount,
        balance.location.dimmed()
    )
}

pub fn render_execution(execution: &AgentExecution) -> String {
    format!(
        "  {}  {}  {}",
        execution.execution_id,
        format_status(&execution.status),
        execution.created_at.as_deref().unwrap_or("-").dimmed()
    )
}

pub fn render_reasoning(step: &AgentReasoning) -> String {
    format!(
        "  {:>3}. {} {}",
        step.step_number,
        format!("[{}]", step.agent_name).magenta(),
        step.reasoning_text
    )
}

pub fn render_transaction(tx: &ExecutedTransaction) -> String {
    format!(
        "  {}  {} {} {:.4}  {}",
        short_hash(&tx.tx_hash),
        tx.protocol.bold(),
        tx.action,
        tx.amount,
        format_transaction_status(tx.status)
    )
}

/// `0x1234...abcd` form of a transaction hash.
pub fn short_hash(hash: &str) -> String {
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() <= 14 {
        return hash.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{}...{}", head, tail)
}
