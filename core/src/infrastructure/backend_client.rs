// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agent Backend HTTP Adapter
//
// Anti-Corruption Layer for the agent backend REST API:
//   POST /api/chat              start a run
//   GET  /api/executions/{id}   poll one run
//   GET  /api/executions        list runs
//   GET  /health                liveness

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::execution::{
    AgentBackend, BackendError, ChatRequest, ChatResponse, ExecutionId, ExecutionStatus,
    ExecutionSummary, HealthStatus,
};

pub struct HttpAgentBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAgentBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Client with a per-request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AgentBackend for HttpAgentBackend {
    async fn start_chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let url = self.url("/api/chat");
        debug!(%url, "Starting agent execution");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    async fn get_execution(&self, id: &ExecutionId) -> Result<ExecutionStatus, BackendError> {
        let url = self.url(&format!("/api/executions/{}", id));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    async fn list_executions(&self) -> Result<Vec<ExecutionSummary>, BackendError> {
        let url = self.url("/api/executions");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    async fn health(&self) -> Result<HealthStatus, BackendError> {
        let url = self.url("/health");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode(response).await
    }
}
