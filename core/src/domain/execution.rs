// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Execution
//!
//! Wire model of one agent run as reported by the agent backend, and the
//! [`AgentBackend`] interface the chat session talks to.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Execution status, chat request/response shapes, backend port

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identifier of one backend-orchestrated run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used when the full id would clutter output.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExecutionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    /// Any status string the backend reports that this client does not know.
    /// Treated as still in progress.
    #[serde(other)]
    Other,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Other => "other",
        }
    }
}

/// Snapshot of a run, as returned by `GET /api/executions/{id}`.
///
/// Replaced wholesale on every poll; the only derived value is the reasoning
/// delta computed by [`new_reasoning`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub execution_id: ExecutionId,
    pub status: RunStatus,
    #[serde(default)]
    pub current_agent: Option<String>,
    #[serde(default)]
    pub reasoning_chain: Vec<String>,
    #[serde(default)]
    pub final_proposal: Option<serde_json::Value>,
    #[serde(default)]
    pub risk_assessment: Option<serde_json::Value>,
    #[serde(default)]
    pub qa_results: Option<serde_json::Value>,
    #[serde(default)]
    pub error_messages: Vec<String>,
}

impl ExecutionStatus {
    /// Status the poller assumes right after the backend accepted a run.
    pub fn started(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            status: RunStatus::Running,
            current_agent: None,
            reasoning_chain: Vec::new(),
            final_proposal: None,
            risk_assessment: None,
            qa_results: None,
            error_messages: Vec::new(),
        }
    }
}

/// Reasoning entries present in `new` but not yet seen in `old`.
///
/// The chain only grows while a run is in progress, so the delta is the suffix
/// of `new` past the previously known length. A shorter or equal chain yields
/// nothing.
pub fn new_reasoning<'a>(old: &[String], new: &'a [String]) -> &'a [String] {
    if new.len() > old.len() {
        &new[old.len()..]
    } else {
        &[]
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub wallet_address: String,
    pub user_id: String,
}

/// Response of `POST /api/chat`. Only the execution id is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub execution_id: ExecutionId,
    #[serde(default)]
    pub portfolio_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Row of `GET /api/executions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: ExecutionId,
    pub status: RunStatus,
    #[serde(default)]
    pub portfolio_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Domain interface for the agent backend.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Start a run for a chat message.
    async fn start_chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;

    /// Fetch the current status of a run.
    async fn get_execution(&self, id: &ExecutionId) -> Result<ExecutionStatus, BackendError>;

    /// List every run the backend is tracking.
    async fn list_executions(&self) -> Result<Vec<ExecutionSummary>, BackendError>;

    /// Check that the backend is reachable.
    async fn health(&self) -> Result<HealthStatus, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_reasoning_returns_suffix() {
        let old = chain(&["a", "b"]);
        let new = chain(&["a", "b", "c", "d"]);
        assert_eq!(new_reasoning(&old, &new), &chain(&["c", "d"])[..]);
    }

    #[test]
    fn test_new_reasoning_empty_when_not_longer() {
        let old = chain(&["a", "b"]);
        assert!(new_reasoning(&old, &chain(&["a", "b"])).is_empty());
        assert!(new_reasoning(&old, &chain(&["a"])).is_empty());
    }

    #[test]
    fn test_status_decodes_with_missing_fields() {
        let status: ExecutionStatus = serde_json::from_str(
            r#"{"execution_id":"abc","status":"running","current_agent":null}"#,
        )
        .unwrap();

        assert_eq!(status.status, RunStatus::Running);
        assert!(status.reasoning_chain.is_empty());
        assert!(status.error_messages.is_empty());
        assert!(status.final_proposal.is_none());
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let status: ExecutionStatus =
            serde_json::from_str(r#"{"execution_id":"abc","status":"queued"}"#).unwrap();
        assert_eq!(status.status, RunStatus::Other);
        assert!(!status.status.is_terminal());
    }

    #[test]
    fn test_short_id() {
        let id = ExecutionId::new("0123456789abcdef");
        assert_eq!(id.short(), "01234567");
        assert_eq!(ExecutionId::new("abc").short(), "abc");
    }
}
