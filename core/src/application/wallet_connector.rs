// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wallet Connector
//!
//! Shared wallet context: one connector is constructed per session and cloned
//! into every consumer. All clones see the same [`WalletState`], and every
//! change is also published on an [`EventBus`] so views can re-render.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** connect / switch-network / balance flows over a [`WalletProvider`]

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::wallet::{
    format_ether, parse_hex_quantity, same_chain, switch_chain_params, ChainParams,
    ConnectionState, ProviderEvent, WalletError, WalletProvider, WalletState,
    BASE_SEPOLIA_CHAIN_ID,
};
use crate::infrastructure::event_bus::{EventBus, EventReceiver};

#[derive(Clone)]
pub struct WalletConnector {
    provider: Option<Arc<dyn WalletProvider>>,
    state: Arc<RwLock<WalletState>>,
    updates: EventBus<WalletState>,
}

impl WalletConnector {
    /// `None` means no wallet provider is installed.
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        let state = WalletState {
            is_installed: provider.is_some(),
            ..Default::default()
        };
        Self {
            provider,
            state: Arc::new(RwLock::new(state)),
            updates: EventBus::with_default_capacity(),
        }
    }

    pub fn snapshot(&self) -> WalletState {
        self.state.read().clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.read().connection()
    }

    /// Receive a snapshot after every state change.
    pub fn updates(&self) -> EventReceiver<WalletState> {
        self.updates.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut WalletState)) {
        let snapshot = {
            let mut state = self.state.write();
            apply(&mut state);
            state.clone()
        };
        self.updates.publish(snapshot);
    }

    fn fail(&self, error: WalletError) -> WalletError {
        let message = error.to_string();
        self.update(|state| {
            state.error = message;
            state.is_connecting = false;
        });
        error
    }

    fn provider(&self) -> Result<&Arc<dyn WalletProvider>, WalletError> {
        self.provider.as_ref().ok_or(WalletError::NotInstalled)
    }

    /// Request account access and return the connected account.
    pub async fn connect_wallet(&self) -> Result<String, WalletError> {
        let provider = match self.provider() {
            Ok(provider) => Arc::clone(provider),
            Err(e) => return Err(self.fail(e)),
        };

        self.update(|state| {
            state.is_connecting = true;
            state.error.clear();
        });

        let accounts = match provider.request("eth_requestAccounts", json!([])).await {
            Ok(value) => value,
            Err(e) if e.is_user_rejection() => return Err(self.fail(WalletError::UserRejected)),
            Err(e) => {
                warn!("Error connecting wallet: {}", e);
                return Err(self.fail(WalletError::ConnectFailed));
            }
        };

        let account = match first_account(&accounts) {
            Some(account) => account,
            None => {
                warn!("eth_requestAccounts returned no accounts: {}", accounts);
                return Err(self.fail(WalletError::ConnectFailed));
            }
        };

        info!(%account, "Wallet connected");
        self.update(|state| {
            state.account = account.clone();
            state.is_connecting = false;
        });

        if let Err(e) = self.check_network().await {
            debug!("Network check after connect failed: {}", e);
        }
        Ok(account)
    }

    /// Query the current chain; refreshes the balance on the target network.
    pub async fn check_network(&self) -> Result<bool, WalletError> {
        let provider = Arc::clone(self.provider()?);
        let chain_id = provider
            .request("eth_chainId", json!([]))
            .await
            .map_err(WalletError::Provider)?;
        let chain_id = chain_id
            .as_str()
            .ok_or_else(|| WalletError::InvalidResponse(format!("chain id {}", chain_id)))?;

        self.apply_chain(chain_id).await;
        Ok(self.state.read().is_correct_network)
    }

    /// Switch to Base Sepolia, registering the network first if the provider
    /// does not know it.
    pub async fn switch_to_base_sepolia(&self) -> Result<(), WalletError> {
        let provider = match self.provider() {
            Ok(provider) => Arc::clone(provider),
            Err(e) => return Err(self.fail(e)),
        };
        let switch_params = switch_chain_params(BASE_SEPOLIA_CHAIN_ID);

        match provider
            .request("wallet_switchEthereumChain", switch_params.clone())
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_unrecognized_chain() => {
                info!("Base Sepolia unknown to the wallet; adding it");
                let add_params = serde_json::to_value([ChainParams::base_sepolia()])
                    .map_err(|e| WalletError::InvalidResponse(e.to_string()))?;
                if let Err(e) = provider.request("wallet_addEthereumChain", add_params).await {
                    warn!("Error adding Base Sepolia: {}", e);
                    return Err(self.fail(WalletError::AddChainFailed));
                }
                if let Err(e) = provider
                    .request("wallet_switchEthereumChain", switch_params)
                    .await
                {
                    warn!("Error switching after adding Base Sepolia: {}", e);
                    return Err(self.fail(WalletError::SwitchFailed));
                }
            }
            Err(e) => {
                warn!("Error switching to Base Sepolia: {}", e);
                return Err(self.fail(WalletError::SwitchFailed));
            }
        }

        self.update(|state| {
            state.is_correct_network = true;
            state.error.clear();
        });
        if let Err(e) = self.refresh_balance().await {
            debug!("Balance refresh after switch failed: {}", e);
        }
        Ok(())
    }

    /// Fetch the native balance of the connected account. Does nothing when
    /// no account is connected or the wallet is on another network.
    pub async fn refresh_balance(&self) -> Result<Option<String>, WalletError> {
        let provider = Arc::clone(self.provider()?);
        let (account, on_target) = {
            let state = self.state.read();
            (state.account.clone(), state.is_correct_network)
        };
        if account.is_empty() || !on_target {
            return Ok(None);
        }

        let raw = provider
            .request("eth_getBalance", json!([account, "latest"]))
            .await
            .map_err(WalletError::Provider)?;
        let raw = raw
            .as_str()
            .ok_or_else(|| WalletError::InvalidResponse(format!("balance {}", raw)))?;
        let balance = format_ether(parse_hex_quantity(raw)?);

        let mut stored = false;
        self.update(|state| {
            // Account or network may have changed while the request was in flight.
            if state.account == account && state.is_correct_network {
                state.balance = balance.clone();
                stored = true;
            }
        });
        Ok(stored.then_some(balance))
    }

    async fn apply_chain(&self, chain_id: &str) {
        let correct = same_chain(chain_id, BASE_SEPOLIA_CHAIN_ID);
        self.update(|state| {
            state.is_correct_network = correct;
            if !correct {
                state.balance.clear();
            }
        });
        if correct {
            if let Err(e) = self.refresh_balance().await {
                warn!("Error getting balance: {}", e);
            }
        }
    }

    /// React to one provider push event.
    pub async fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.into_iter().next() {
                None => {
                    info!("Wallet disconnected");
                    self.update(|state| {
                        state.account.clear();
                        state.balance.clear();
                    });
                }
                Some(account) => {
                    self.update(|state| state.account = account);
                    if let Err(e) = self.refresh_balance().await {
                        warn!("Error getting balance: {}", e);
                    }
                }
            },
            ProviderEvent::ChainChanged(chain_id) => self.apply_chain(&chain_id).await,
        }
    }

    /// Run the initial network check, then feed provider events into the
    /// connector until the provider goes away.
    pub fn listen(&self) -> Option<JoinHandle<()>> {
        let provider = Arc::clone(self.provider.as_ref()?);
        let connector = self.clone();
        let mut events = provider.subscribe();

        Some(tokio::spawn(async move {
            if let Err(e) = connector.check_network().await {
                debug!("Initial network check failed: {}", e);
            }

            loop {
                match events.recv().await {
                    Ok(event) => connector.handle_event(event).await,
                    Err(RecvError::Lagged(n)) => {
                        warn!("Wallet event listener lagged by {} events", n);
                        if let Err(e) = connector.check_network().await {
                            debug!("Network re-check failed: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }
}

fn first_account(accounts: &Value) -> Option<String> {
    accounts
        .as_array()?
        .first()?
        .as_str()
        .map(str::to_string)
}
