// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chat Session
//!
//! Driver of the [`ExecutionPoller`]: performs the effects each transition asks
//! for against an [`AgentBackend`] and appends the resulting messages to the
//! session's [`MessageLog`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** start a run, poll it on a fixed cadence, stop on terminal status

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::domain::config::ChatDefaults;
use crate::domain::execution::{AgentBackend, ChatRequest, ExecutionId, ExecutionStatus};
use crate::domain::message::MessageLog;
use crate::domain::poller::{ExecutionPoller, PollerError, PollerEffect, PollerPhase, Transition};

pub struct ChatSession {
    backend: Arc<dyn AgentBackend>,
    defaults: ChatDefaults,
    poll_interval: Duration,
    poller: ExecutionPoller,
    log: MessageLog,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn AgentBackend>, defaults: ChatDefaults, poll_interval: Duration) -> Self {
        Self {
            backend,
            defaults,
            poll_interval,
            poller: ExecutionPoller::new(),
            log: MessageLog::new(),
        }
    }

    pub fn messages(&self) -> &MessageLog {
        &self.log
    }

    pub fn active_execution(&self) -> Option<&ExecutionStatus> {
        self.poller.active()
    }

    pub fn is_busy(&self) -> bool {
        self.poller.is_busy()
    }

    pub fn phase(&self) -> PollerPhase {
        self.poller.phase()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Start a run for `text`. Returns the execution id when the backend
    /// accepted it, `None` when the start request failed (the failure is
    /// reported in the log).
    pub async fn send_message(&mut self, text: &str) -> Result<Option<ExecutionId>, PollerError> {
        let transition = self.poller.start_requested(text)?;
        self.perform(transition).await;
        Ok(self.poller.active().map(|status| status.execution_id.clone()))
    }

    /// One polling tick. Returns whether the run is still in progress.
    pub async fn poll_once(&mut self) -> bool {
        let transition = self.poller.tick_elapsed();
        self.perform(transition).await;
        self.poller.phase() == PollerPhase::Running
    }

    /// Poll on the configured cadence until the run is terminal.
    pub async fn run_until_terminal(&mut self) {
        self.run_until_terminal_with(|_| {}).await
    }

    /// As [`run_until_terminal`](Self::run_until_terminal), calling
    /// `on_update` with the log after every tick.
    pub async fn run_until_terminal_with<F>(&mut self, mut on_update: F)
    where
        F: FnMut(&MessageLog),
    {
        if self.poller.phase() != PollerPhase::Running {
            return;
        }

        let mut interval =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let running = self.poll_once().await;
            on_update(&self.log);
            if !running {
                break;
            }
        }
    }

    async fn perform(&mut self, transition: Transition) {
        let mut pending: VecDeque<PollerEffect> = self.apply(transition).into();

        while let Some(effect) = pending.pop_front() {
            let next = match effect {
                PollerEffect::StartRun(message) => {
                    let request = ChatRequest {
                        message,
                        wallet_address: self.defaults.wallet_address.clone(),
                        user_id: self.defaults.user_id.clone(),
                    };
                    match self.backend.start_chat(&request).await {
                        Ok(response) => self.poller.start_succeeded(response.execution_id),
                        Err(e) => self.poller.start_failed(&e.to_string()),
                    }
                }
                PollerEffect::Fetch(id) => match self.backend.get_execution(&id).await {
                    Ok(status) => self.poller.fetch_succeeded(status),
                    Err(e) => self.poller.fetch_failed(&e.to_string()),
                },
                PollerEffect::StartPolling(id) => {
                    debug!(execution_id = %id, interval = ?self.poll_interval, "Polling started");
                    continue;
                }
                PollerEffect::StopPolling => {
                    debug!("Polling stopped");
                    continue;
                }
            };
            pending.extend(self.apply(next));
        }
    }

    fn apply(&mut self, transition: Transition) -> Vec<PollerEffect> {
        self.log.extend(transition.messages);
        transition.effects
    }
}
