// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Poller
//!
//! State machine behind the chat view. One transition function per event;
//! every transition returns the message drafts to append and the effects the
//! driver has to perform. The poller itself does no I/O, which keeps the whole
//! start / poll / finish lifecycle testable without a backend.
//!
//! ```text
//!  idle ──start_requested──▶ starting ──start_succeeded──▶ running
//!   ▲                           │                            │ tick_elapsed ─▶ Fetch(id)
//!   │                      start_failed                      │ fetch_succeeded (running)
//!   │◀──────────────────────────┘                            │ fetch_failed (skip tick)
//!   │◀──────────── fetch_succeeded (completed | failed) ─────┘
//! ```
//!
//! Polls are serialized: a tick that arrives while a fetch is still in flight
//! is dropped instead of issuing a second request.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::execution::{new_reasoning, ExecutionId, ExecutionStatus, RunStatus};
use crate::domain::message::MessageDraft;

pub const DEFAULT_AGENT_LABEL: &str = "Agent";
pub const PROPOSAL_AGENT: &str = "DeFi Agent";
pub const RISK_AGENT: &str = "Risk Agent";
pub const COMPLETED_TEXT: &str = "✅ Execution completed successfully!";
pub const BACKEND_UNREACHABLE_TEXT: &str =
    "❌ Failed to connect to AI backend. Please make sure the backend server is running.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollerError {
    #[error("An execution is already in progress")]
    AlreadyRunning,

    #[error("Message is empty")]
    EmptyMessage,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEffect {
    /// Send the chat text to the backend to start a run.
    StartRun(String),
    /// Begin the fixed-cadence timer for this run.
    StartPolling(ExecutionId),
    /// Fetch the current status of this run.
    Fetch(ExecutionId),
    /// Stop the timer; the run reached a terminal status.
    StopPolling,
}

/// Output of one transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub messages: Vec<MessageDraft>,
    pub effects: Vec<PollerEffect>,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }

    fn message(mut self, draft: MessageDraft) -> Self {
        self.messages.push(draft);
        self
    }

    fn effect(mut self, effect: PollerEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRun {
    pub status: ExecutionStatus,
    pub fetch_in_flight: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollerState {
    Idle,
    /// Start request in flight; holds the single-run mutex.
    Starting,
    Running(ActiveRun),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    Idle,
    Starting,
    Running,
}

#[derive(Debug, Clone)]
pub struct ExecutionPoller {
    state: PollerState,
}

impl Default for ExecutionPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionPoller {
    pub fn new() -> Self {
        Self {
            state: PollerState::Idle,
        }
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    pub fn phase(&self) -> PollerPhase {
        match self.state {
            PollerState::Idle => PollerPhase::Idle,
            PollerState::Starting => PollerPhase::Starting,
            PollerState::Running(_) => PollerPhase::Running,
        }
    }

    /// True while a run is starting or running; new messages are rejected.
    pub fn is_busy(&self) -> bool {
        !matches!(self.state, PollerState::Idle)
    }

    /// Status of the active run, if one is running.
    pub fn active(&self) -> Option<&ExecutionStatus> {
        match &self.state {
            PollerState::Running(run) => Some(&run.status),
            _ => None,
        }
    }

    /// The user submitted chat text.
    pub fn start_requested(&mut self, text: &str) -> Result<Transition, PollerError> {
        if self.is_busy() {
            return Err(PollerError::AlreadyRunning);
        }
        if text.trim().is_empty() {
            return Err(PollerError::EmptyMessage);
        }

        self.state = PollerState::Starting;
        Ok(Transition::none()
            .message(MessageDraft::user(format!("user-{}", now_millis()), text))
            .effect(PollerEffect::StartRun(text.to_string())))
    }

    /// The backend accepted the run.
    pub fn start_succeeded(&mut self, execution_id: ExecutionId) -> Transition {
        if !matches!(self.state, PollerState::Starting) {
            warn!(%execution_id, "Start acknowledgement received while not starting; ignoring");
            return Transition::none();
        }

        info!(%execution_id, "Execution started");
        self.state = PollerState::Running(ActiveRun {
            status: ExecutionStatus::started(execution_id.clone()),
            fetch_in_flight: false,
        });

        Transition::none()
            .message(
                MessageDraft::system(
                    format!("system-{}", now_millis()),
                    format!("🤖 Starting AI agent execution... (ID: {})", execution_id),
                )
                .with_execution(execution_id.clone()),
            )
            .effect(PollerEffect::StartPolling(execution_id))
    }

    /// The start request failed before a run existed.
    pub fn start_failed(&mut self, error: &str) -> Transition {
        if !matches!(self.state, PollerState::Starting) {
            return Transition::none();
        }

        warn!("Error sending message: {}", error);
        self.state = PollerState::Idle;
        Transition::none().message(MessageDraft::system(
            format!("error-{}", now_millis()),
            BACKEND_UNREACHABLE_TEXT,
        ))
    }

    /// The polling interval elapsed.
    pub fn tick_elapsed(&mut self) -> Transition {
        match &mut self.state {
            PollerState::Running(run) if !run.fetch_in_flight => {
                run.fetch_in_flight = true;
                Transition::none().effect(PollerEffect::Fetch(run.status.execution_id.clone()))
            }
            PollerState::Running(run) => {
                debug!(
                    execution_id = %run.status.execution_id,
                    "Previous status fetch still in flight; skipping tick"
                );
                Transition::none()
            }
            _ => Transition::none(),
        }
    }

    /// A status fetch returned a decodable response.
    pub fn fetch_succeeded(&mut self, status: ExecutionStatus) -> Transition {
        let run = match &mut self.state {
            PollerState::Running(run) => run,
            _ => {
                debug!("Status response arrived after polling stopped; ignoring");
                return Transition::none();
            }
        };

        if run.status.execution_id != status.execution_id {
            debug!(
                expected = %run.status.execution_id,
                received = %status.execution_id,
                "Status response for a different execution; ignoring"
            );
            run.fetch_in_flight = false;
            return Transition::none();
        }

        let execution_id = status.execution_id.clone();
        let mut transition = Transition::none();

        let known = run.status.reasoning_chain.len();
        let agent_name = status
            .current_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_AGENT_LABEL.to_string());
        for (offset, reasoning) in new_reasoning(&run.status.reasoning_chain, &status.reasoning_chain)
            .iter()
            .enumerate()
        {
            transition = transition.message(
                MessageDraft::agent(
                    format!("{}-reasoning-{}", execution_id, known + offset),
                    reasoning.clone(),
                )
                .with_execution(execution_id.clone())
                .with_agent(agent_name.clone()),
            );
        }

        match status.status {
            RunStatus::Completed => {
                info!(%execution_id, "Execution completed");
                transition = transition.message(
                    MessageDraft::system(format!("{}-complete", execution_id), COMPLETED_TEXT)
                        .with_execution(execution_id.clone())
                        .with_status(RunStatus::Completed),
                );

                if let Some(proposal) = &status.final_proposal {
                    transition = transition.message(
                        MessageDraft::agent(
                            format!("{}-proposal", execution_id),
                            format!("📊 Final Proposal: {}", render_json(proposal)),
                        )
                        .with_execution(execution_id.clone())
                        .with_agent(PROPOSAL_AGENT),
                    );
                }

                if let Some(risk) = &status.risk_assessment {
                    transition = transition.message(
                        MessageDraft::agent(
                            format!("{}-risk", execution_id),
                            format!("🛡️ Risk Assessment: {}", render_json(risk)),
                        )
                        .with_execution(execution_id.clone())
                        .with_agent(RISK_AGENT),
                    );
                }

                self.state = PollerState::Idle;
                transition.effect(PollerEffect::StopPolling)
            }
            RunStatus::Failed => {
                warn!(%execution_id, errors = ?status.error_messages, "Execution failed");
                transition = transition.message(
                    MessageDraft::system(
                        format!("{}-failed", execution_id),
                        format!("❌ Execution failed: {}", status.error_messages.join(", ")),
                    )
                    .with_execution(execution_id.clone())
                    .with_status(RunStatus::Failed),
                );

                self.state = PollerState::Idle;
                transition.effect(PollerEffect::StopPolling)
            }
            RunStatus::Running | RunStatus::Other => {
                run.status = status;
                run.fetch_in_flight = false;
                transition
            }
        }
    }

    /// A status fetch failed (transport, non-2xx, or undecodable body).
    ///
    /// The tick is skipped and the error only logged. There is no backoff and
    /// no retry cap, so an unreachable backend is polled until the driver
    /// stops.
    pub fn fetch_failed(&mut self, error: &str) -> Transition {
        if let PollerState::Running(run) = &mut self.state {
            warn!(
                execution_id = %run.status.execution_id,
                "Error fetching execution status: {}",
                error
            );
            run.fetch_in_flight = false;
        }
        Transition::none()
    }
}

fn render_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
