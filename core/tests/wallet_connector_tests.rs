// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Wallet connector flows against a recording provider: network switching
//! with the add-chain fallback, and push events delivered through `listen()`.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use spark_core::application::WalletConnector;
use spark_core::domain::wallet::{
    ConnectionState, ProviderError, ProviderEvent, WalletError, WalletProvider,
    BASE_SEPOLIA_CHAIN_ID,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Answers each method from a per-method queue; the last answer repeats.
struct RecordingProvider {
    answers: Mutex<Vec<(String, VecDeque<Result<Value, ProviderError>>)>>,
    calls: Mutex<Vec<(String, Value)>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl RecordingProvider {
    fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            answers: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            events,
        })
    }

    fn answer(self: &Arc<Self>, method: &str, results: Vec<Result<Value, ProviderError>>) -> Arc<Self> {
        self.answers
            .lock()
            .push((method.to_string(), results.into_iter().collect()));
        Arc::clone(self)
    }

    fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for RecordingProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls.lock().push((method.to_string(), params));
        let mut answers = self.answers.lock();
        let queue = answers
            .iter_mut()
            .find(|(m, _)| m == method)
            .map(|(_, queue)| queue);
        match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Err(ProviderError::new(-32601, format!("{method} not supported"))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

fn unknown_chain() -> ProviderError {
    ProviderError::new(4902, "Unrecognized chain ID \"0x14a34\"")
}

#[tokio::test]
async fn test_unknown_chain_adds_once_then_switches_again() {
    let provider = RecordingProvider::new()
        .answer(
            "wallet_switchEthereumChain",
            vec![Err(unknown_chain()), Ok(Value::Null)],
        )
        .answer("wallet_addEthereumChain", vec![Ok(Value::Null)]);
    let connector = WalletConnector::new(Some(provider.clone()));

    connector.switch_to_base_sepolia().await.unwrap();

    assert_eq!(
        provider.methods(),
        vec![
            "wallet_switchEthereumChain",
            "wallet_addEthereumChain",
            "wallet_switchEthereumChain",
        ]
    );
    let calls = provider.calls.lock().clone();
    assert_eq!(calls[0].1, json!([{ "chainId": BASE_SEPOLIA_CHAIN_ID }]));
    assert_eq!(calls[1].1[0]["chainName"], "Base Sepolia");
    assert_eq!(calls[1].1[0]["nativeCurrency"]["symbol"], "ETH");

    let state = connector.snapshot();
    assert!(state.is_correct_network);
    assert!(state.error.is_empty());
}

#[tokio::test]
async fn test_add_chain_failure_surfaces_message() {
    let provider = RecordingProvider::new()
        .answer("wallet_switchEthereumChain", vec![Err(unknown_chain())])
        .answer(
            "wallet_addEthereumChain",
            vec![Err(ProviderError::new(4001, "User rejected"))],
        );
    let connector = WalletConnector::new(Some(provider.clone()));

    assert_eq!(
        connector.switch_to_base_sepolia().await.unwrap_err(),
        WalletError::AddChainFailed
    );
    assert_eq!(connector.snapshot().error, "Failed to add Base Sepolia network");
    assert_eq!(
        provider.methods(),
        vec!["wallet_switchEthereumChain", "wallet_addEthereumChain"]
    );
}

#[tokio::test]
async fn test_retry_switch_failure_is_switch_failed() {
    let provider = RecordingProvider::new()
        .answer(
            "wallet_switchEthereumChain",
            vec![Err(unknown_chain()), Err(unknown_chain())],
        )
        .answer("wallet_addEthereumChain", vec![Ok(Value::Null)]);
    let connector = WalletConnector::new(Some(provider.clone()));

    assert_eq!(
        connector.switch_to_base_sepolia().await.unwrap_err(),
        WalletError::SwitchFailed
    );
    assert_eq!(provider.methods().len(), 3);
    assert!(!connector.snapshot().is_correct_network);
}

#[tokio::test]
async fn test_connect_then_switch_fetches_balance() {
    let provider = RecordingProvider::new()
        .answer("eth_requestAccounts", vec![Ok(json!(["0xabc"]))])
        .answer("eth_chainId", vec![Ok(json!("0x1"))])
        .answer("wallet_switchEthereumChain", vec![Ok(Value::Null)])
        .answer("eth_getBalance", vec![Ok(json!("0x1bc16d674ec80000"))]);
    let connector = WalletConnector::new(Some(provider.clone()));

    connector.connect_wallet().await.unwrap();
    assert_eq!(connector.connection(), ConnectionState::ConnectedWrongNetwork);
    assert!(connector.snapshot().balance.is_empty());

    connector.switch_to_base_sepolia().await.unwrap();
    let state = connector.snapshot();
    assert_eq!(state.connection(), ConnectionState::ConnectedCorrectNetwork);
    assert_eq!(state.balance, "2.0000");

    let balance_call = provider
        .calls
        .lock()
        .iter()
        .find(|(m, _)| m == "eth_getBalance")
        .cloned()
        .unwrap();
    assert_eq!(balance_call.1, json!(["0xabc", "latest"]));
}

#[tokio::test]
async fn test_listen_checks_network_and_follows_events() {
    let provider = RecordingProvider::new()
        .answer("eth_chainId", vec![Ok(json!(BASE_SEPOLIA_CHAIN_ID))])
        .answer("eth_getBalance", vec![Ok(json!("0x0"))]);
    let connector = WalletConnector::new(Some(provider.clone()));
    let mut updates = connector.updates();

    let listener = connector.listen().unwrap();
    tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(connector.snapshot().is_correct_network);

    provider.emit(ProviderEvent::AccountsChanged(vec!["0xabc".to_string()]));
    let state = loop {
        let state = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap();
        if !state.balance.is_empty() {
            break state;
        }
    };
    assert_eq!(state.account, "0xabc");
    assert_eq!(state.balance, "0.0000");

    provider.emit(ProviderEvent::AccountsChanged(vec![]));
    let state = loop {
        let state = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap();
        if state.account.is_empty() {
            break state;
        }
    };
    assert!(state.balance.is_empty());
    assert_eq!(state.connection(), ConnectionState::Disconnected);

    listener.abort();
}
