// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Wallet Provider JSON-RPC Adapter
//
// EIP-1193 requests forwarded as JSON-RPC 2.0 over HTTP to a local wallet
// endpoint (a desktop wallet's RPC port, a signer proxy, a dev node).
// HTTP has no push channel, so `accountsChanged` / `chainChanged` are
// synthesized by a watcher task that polls `eth_accounts` and `eth_chainId`
// and publishes differences on the event bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::domain::wallet::{same_chain, ProviderError, ProviderEvent, WalletProvider};
use crate::infrastructure::event_bus::EventBus;

/// JSON-RPC "internal error", used for transport and decoding failures.
pub const INTERNAL_ERROR_CODE: i64 = -32603;

#[derive(Clone)]
pub struct JsonRpcWalletProvider {
    client: reqwest::Client,
    endpoint: String,
    next_id: Arc<AtomicU64>,
    events: EventBus<ProviderEvent>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ProviderError>,
}

/// Accounts and chain last observed by the watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSnapshot {
    pub accounts: Vec<String>,
    pub chain_id: String,
}

/// Events implied by moving from `previous` to `next`.
pub fn detect_changes(previous: &ProviderSnapshot, next: &ProviderSnapshot) -> Vec<ProviderEvent> {
    let mut events = Vec::new();
    if previous.accounts != next.accounts {
        events.push(ProviderEvent::AccountsChanged(next.accounts.clone()));
    }
    if !same_chain(&previous.chain_id, &next.chain_id) {
        events.push(ProviderEvent::ChainChanged(next.chain_id.clone()));
    }
    events
}

impl JsonRpcWalletProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            next_id: Arc::new(AtomicU64::new(1)),
            events: EventBus::with_default_capacity(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Event bus the watcher publishes to.
    pub fn events(&self) -> &EventBus<ProviderEvent> {
        &self.events
    }

    async fn snapshot(&self) -> Result<ProviderSnapshot, ProviderError> {
        let accounts = self.request("eth_accounts", json!([])).await?;
        let accounts: Vec<String> = serde_json::from_value(accounts)
            .map_err(|e| ProviderError::new(INTERNAL_ERROR_CODE, e.to_string()))?;
        let chain_id = self
            .request("eth_chainId", json!([]))
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new(INTERNAL_ERROR_CODE, "eth_chainId returned a non-string"))?;
        Ok(ProviderSnapshot { accounts, chain_id })
    }

    /// Poll the endpoint every `every` and publish account / chain changes.
    /// The first successful poll only records the baseline.
    pub fn spawn_watcher(&self, every: Duration) -> JoinHandle<()> {
        let provider = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<ProviderSnapshot> = None;

            loop {
                interval.tick().await;
                let next = match provider.snapshot().await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        debug!("Wallet watcher poll failed: {}", e);
                        continue;
                    }
                };

                if let Some(previous) = &last {
                    for event in detect_changes(previous, &next) {
                        provider.events.publish(event);
                    }
                }
                last = Some(next);
            }
        })
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "Wallet provider request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new(INTERNAL_ERROR_CODE, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                INTERNAL_ERROR_CODE,
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let rpc: RpcResponse = response.json().await.map_err(|e| {
            ProviderError::new(INTERNAL_ERROR_CODE, format!("Failed to parse response: {}", e))
        })?;

        if let Some(error) = rpc.error {
            warn!(method, code = error.code, "Wallet provider returned an error: {}", error.message);
            return Err(error);
        }
        Ok(rpc.result.unwrap_or(Value::Null))
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe_raw()
    }
}
