// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Chat with the agent
//!
//! One-shot (`spark chat "Find best USDC yield"`) or interactive when no
//! message is given. Each request starts a backend run that is polled until
//! it completes or fails; reasoning steps are printed as they arrive.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use spark_core::application::ChatSession;
use spark_core::domain::message::{MessageLog, MessageRole};
use spark_core::domain::poller::{PollerError, PollerPhase};

use super::{agent_backend, load_config};
use crate::render::render_message;

#[derive(Args)]
pub struct ChatArgs {
    /// Message to send (omit for an interactive session)
    #[arg(value_name = "MESSAGE")]
    pub message: Option<String>,

    /// Wallet address sent with each request
    #[arg(long, value_name = "ADDRESS")]
    pub wallet_address: Option<String>,

    /// User id sent with each request
    #[arg(long, value_name = "USER_ID")]
    pub user_id: Option<String>,

    /// Print the message log as JSON when the run ends
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_command(args: ChatArgs, config_override: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_override)?;
    if let Some(address) = args.wallet_address {
        config.chat.wallet_address = address;
    }
    if let Some(user_id) = args.user_id {
        config.chat.user_id = user_id;
    }

    let backend = Arc::new(agent_backend(&config)?);
    let mut session = ChatSession::new(backend, config.chat.clone(), config.backend.poll_interval);

    match args.message {
        Some(message) => {
            let mut printer = Printer::new(!args.json, true);
            run_turn(&mut session, &message, &mut printer).await;
            if args.json {
                let json = serde_json::to_string_pretty(session.messages().entries())
                    .context("Failed to serialize messages")?;
                println!("{}", json);
            }
        }
        None => interactive(&mut session).await?,
    }

    Ok(())
}

async fn interactive(session: &mut ChatSession) -> Result<()> {
    println!(
        "{}",
        "Ask the agent about your DeFi portfolio. Type /quit to exit.".bold()
    );

    // The prompt already shows what was typed.
    let mut printer = Printer::new(true, false);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if matches!(line, "/quit" | "/exit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        run_turn(session, line, &mut printer).await;
    }

    Ok(())
}

/// Prints log entries not printed yet.
struct Printer {
    printed: u64,
    enabled: bool,
    show_user: bool,
}

impl Printer {
    fn new(enabled: bool, show_user: bool) -> Self {
        Self {
            printed: 0,
            enabled,
            show_user,
        }
    }

    fn print_new(&mut self, log: &MessageLog) {
        if self.enabled {
            for message in log.since(self.printed) {
                if self.show_user || message.role != MessageRole::User {
                    println!("{}", render_message(message));
                }
            }
        }
        self.printed = log.last_seq();
    }
}

/// Send `text` and follow the run until it is terminal.
async fn run_turn(session: &mut ChatSession, text: &str, printer: &mut Printer) {
    match session.send_message(text).await {
        Ok(_) => {}
        Err(PollerError::EmptyMessage) => return,
        Err(e) => {
            println!("{}", e.to_string().yellow());
            return;
        }
    }
    printer.print_new(session.messages());

    if session.phase() != PollerPhase::Running {
        return;
    }

    let spinner = spinner(printer.enabled);
    session
        .run_until_terminal_with(|log| {
            spinner.suspend(|| printer.print_new(log));
            if let Some(last) = log.last().filter(|m| m.role == MessageRole::Agent) {
                spinner.set_message(format!("{} is thinking...", last.author_label()));
            }
        })
        .await;
    spinner.finish_and_clear();
}

fn spinner(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Agent is working...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
