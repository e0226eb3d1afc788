// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end chat flow against a scripted agent backend.
//!
//! The backend answers each status fetch with the next scripted response, so
//! the tests can walk a run through reasoning growth, transient fetch errors
//! and a terminal status, and check exactly what lands in the message log.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use spark_core::application::ChatSession;
use spark_core::domain::config::ChatDefaults;
use spark_core::domain::execution::{
    AgentBackend, BackendError, ChatRequest, ChatResponse, ExecutionId, ExecutionStatus,
    ExecutionSummary, HealthStatus, RunStatus,
};
use spark_core::domain::message::MessageRole;
use spark_core::domain::poller::{PollerError, PollerPhase, COMPLETED_TEXT};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

struct ScriptedBackend {
    execution_id: String,
    statuses: Mutex<VecDeque<Result<ExecutionStatus, BackendError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    fetches: Mutex<usize>,
}

impl ScriptedBackend {
    fn new(execution_id: &str, statuses: Vec<Result<ExecutionStatus, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            execution_id: execution_id.to_string(),
            statuses: Mutex::new(statuses.into()),
            requests: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        })
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn start_chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        self.requests.lock().push(request.clone());
        Ok(ChatResponse {
            execution_id: ExecutionId::new(self.execution_id.clone()),
            portfolio_id: Some("p1".to_string()),
            status: Some("started".to_string()),
            message: Some("Agent execution started".to_string()),
        })
    }

    async fn get_execution(&self, _id: &ExecutionId) -> Result<ExecutionStatus, BackendError> {
        *self.fetches.lock() += 1;
        self.statuses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Network("script exhausted".to_string())))
    }

    async fn list_executions(&self) -> Result<Vec<ExecutionSummary>, BackendError> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<HealthStatus, BackendError> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            timestamp: None,
        })
    }
}

fn status(id: &str, run: RunStatus, chain: &[&str], agent: Option<&str>) -> ExecutionStatus {
    let mut status = ExecutionStatus::started(ExecutionId::new(id));
    status.status = run;
    status.reasoning_chain = chain.iter().map(|s| s.to_string()).collect();
    status.current_agent = agent.map(str::to_string);
    status
}

fn session(backend: Arc<ScriptedBackend>) -> ChatSession {
    ChatSession::new(backend, ChatDefaults::default(), Duration::from_secs(2))
}

#[tokio::test]
async fn test_send_message_appends_user_then_system_and_starts_running() {
    let backend = ScriptedBackend::new("exec-1", vec![]);
    let mut chat = session(backend.clone());

    let started = chat.send_message("Find best USDC yield").await.unwrap();
    assert_eq!(started, Some(ExecutionId::new("exec-1")));
    assert_eq!(chat.phase(), PollerPhase::Running);

    let entries = chat.messages().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].role, MessageRole::User);
    assert_eq!(entries[0].text, "Find best USDC yield");
    assert_eq!(entries[1].role, MessageRole::System);
    assert!(entries[1].text.contains("exec-1"));

    let requests = backend.requests.lock().clone();
    assert_eq!(requests[0].wallet_address, "0xDemoWallet123");
    assert_eq!(requests[0].user_id, "demo_user");
}

#[tokio::test]
async fn test_second_message_rejected_while_running() {
    let backend = ScriptedBackend::new("exec-1", vec![]);
    let mut chat = session(backend.clone());
    chat.send_message("first").await.unwrap();

    assert_eq!(
        chat.send_message("second").await.unwrap_err(),
        PollerError::AlreadyRunning
    );
    assert_eq!(backend.requests.lock().len(), 1);
    assert_eq!(chat.messages().len(), 2);
    assert_eq!(
        chat.active_execution().unwrap().execution_id,
        ExecutionId::new("exec-1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_run_to_completion() {
    let backend = ScriptedBackend::new(
        "exec-7",
        vec![
            Ok(status("exec-7", RunStatus::Running, &["Analyzing portfolio"], Some("orchestrator"))),
            Err(BackendError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            Ok(status(
                "exec-7",
                RunStatus::Running,
                &["Analyzing portfolio", "Found Aave at 5.2%", "Scoring risk"],
                Some("risk_agent"),
            )),
            Ok({
                let mut done = status(
                    "exec-7",
                    RunStatus::Completed,
                    &["Analyzing portfolio", "Found Aave at 5.2%", "Scoring risk"],
                    None,
                );
                done.final_proposal = Some(json!({"protocol": "aave", "apy": 5.2}));
                done.risk_assessment = Some(json!({"risk_score": 2.1, "safe": true}));
                done
            }),
        ],
    );
    let mut chat = session(backend.clone());
    chat.send_message("Find best USDC yield").await.unwrap();

    let mut seen = 0;
    chat.run_until_terminal_with(|log| seen = log.last_seq()).await;

    assert_eq!(*backend.fetches.lock(), 4);
    assert!(!chat.is_busy());
    assert!(chat.active_execution().is_none());

    let entries = chat.messages().entries();
    let texts: Vec<&str> = entries.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts[2..5], ["Analyzing portfolio", "Found Aave at 5.2%", "Scoring risk"]);
    assert_eq!(entries[2].agent_name.as_deref(), Some("orchestrator"));
    assert_eq!(entries[3].agent_name.as_deref(), Some("risk_agent"));
    assert_eq!(texts[5], COMPLETED_TEXT);
    assert!(texts[6].starts_with("📊 Final Proposal:"));
    assert!(texts[7].starts_with("🛡️ Risk Assessment:"));
    assert_eq!(entries.len(), 8);

    let seqs: Vec<u64> = entries.iter().map(|m| m.seq).collect();
    assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(seen, chat.messages().last_seq());

    // A new run can start once the previous one is terminal.
    assert!(chat.send_message("again").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_reports_joined_errors() {
    let backend = ScriptedBackend::new(
        "exec-3",
        vec![Ok({
            let mut failed = status("exec-3", RunStatus::Failed, &[], None);
            failed.error_messages = vec!["RPC timeout".to_string(), "No liquidity".to_string()];
            failed
        })],
    );
    let mut chat = session(backend);
    chat.send_message("Rebalance").await.unwrap();
    chat.run_until_terminal().await;

    let last = chat.messages().last().unwrap();
    assert_eq!(last.role, MessageRole::System);
    assert_eq!(last.text, "❌ Execution failed: RPC timeout, No liquidity");
    assert_eq!(last.status, Some(RunStatus::Failed));
    assert_eq!(chat.phase(), PollerPhase::Idle);
}

#[tokio::test]
async fn test_poll_once_skips_transient_errors() {
    let backend = ScriptedBackend::new(
        "exec-5",
        vec![Err(BackendError::Network("connection reset".to_string()))],
    );
    let mut chat = session(backend);
    chat.send_message("hello").await.unwrap();

    assert!(chat.poll_once().await);
    assert_eq!(chat.messages().len(), 2);
    assert_eq!(chat.phase(), PollerPhase::Running);
}
