// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wallet
//!
//! Domain model of the wallet connection and the [`WalletProvider`] port.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** EIP-1193 provider interface, connection state, target chain

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;

/// EIP-1193 code for a request the user rejected.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-3326 code for a chain the provider does not know about.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

pub const BASE_SEPOLIA_CHAIN_ID: &str = "0x14a34"; // 84532

/// Metadata sent with `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl ChainParams {
    pub fn base_sepolia() -> Self {
        Self {
            chain_id: BASE_SEPOLIA_CHAIN_ID.to_string(),
            chain_name: "Base Sepolia".to_string(),
            native_currency: NativeCurrency {
                name: "Sepolia Ether".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://sepolia.base.org".to_string()],
            block_explorer_urls: vec!["https://sepolia.basescan.org".to_string()],
        }
    }
}

/// Error object returned by a provider request (`{code, message}`).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_CODE
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == UNRECOGNIZED_CHAIN_CODE
    }
}

/// Push notifications emitted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(String),
}

/// Domain interface for an EIP-1193 style wallet provider.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Issue one provider request.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Receive `accountsChanged` / `chainChanged` notifications.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// User-facing wallet failures. The display string is what gets shown inline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Please install a wallet provider to connect your wallet")]
    NotInstalled,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Failed to connect wallet")]
    ConnectFailed,

    #[error("Failed to switch to Base Sepolia network")]
    SwitchFailed,

    #[error("Failed to add Base Sepolia network")]
    AddChainFailed,

    #[error("Wallet request failed: {0}")]
    Provider(ProviderError),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Snapshot of the shared wallet context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    /// Connected account, empty when disconnected.
    pub account: String,
    /// Native balance formatted with 4 decimals, empty when unknown.
    pub balance: String,
    pub is_connecting: bool,
    /// Last user-facing error, empty when none.
    pub error: String,
    pub is_correct_network: bool,
    pub is_installed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    NotInstalled,
    Disconnected,
    Connecting,
    ConnectedWrongNetwork,
    ConnectedCorrectNetwork,
}

impl WalletState {
    pub fn connection(&self) -> ConnectionState {
        if !self.is_installed {
            ConnectionState::NotInstalled
        } else if self.is_connecting {
            ConnectionState::Connecting
        } else if self.account.is_empty() {
            ConnectionState::Disconnected
        } else if self.is_correct_network {
            ConnectionState::ConnectedCorrectNetwork
        } else {
            ConnectionState::ConnectedWrongNetwork
        }
    }

    /// `0x1234...abcd` form of the connected account.
    pub fn short_account(&self) -> String {
        let chars: Vec<char> = self.account.chars().collect();
        if chars.len() <= 10 {
            return self.account.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Params for `wallet_switchEthereumChain`.
pub fn switch_chain_params(chain_id: &str) -> Value {
    json!([{ "chainId": chain_id }])
}

/// Parse a 0x-prefixed hex quantity (e.g. an `eth_getBalance` result).
pub fn parse_hex_quantity(raw: &str) -> Result<u128, WalletError> {
    let value = raw.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| WalletError::InvalidResponse(format!("{raw} must be 0x-prefixed hex")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| WalletError::InvalidResponse(format!("failed to parse {raw} as hex: {e}")))
}

/// Format a wei amount as ether rounded to 4 decimal places.
pub fn format_ether(wei: u128) -> String {
    const UNIT: u128 = 100_000_000_000_000; // 10^14 wei per 0.0001 ether
    let units = wei / UNIT + u128::from(wei % UNIT >= UNIT / 2);
    format!("{}.{:04}", units / 10_000, units % 10_000)
}

/// Chain ids compare case-insensitively (`0x14A34` == `0x14a34`).
pub fn same_chain(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(0), "0.0000");
        assert_eq!(format_ether(1_500_000_000_000_000_000), "1.5000");
        assert_eq!(format_ether(123_456_789_000_000_000), "0.1235");
        assert_eq!(format_ether(99_995_000_000_000_000_000), "99.9950");
        assert_eq!(format_ether(999_940_000_000_000_000), "0.9999");
        assert_eq!(format_ether(999_960_000_000_000_000), "1.0000");
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x").unwrap(), 0);
        assert_eq!(
            parse_hex_quantity("0x14d1120d7b160000").unwrap(),
            1_500_000_000_000_000_000
        );
        assert!(parse_hex_quantity("1234").is_err());
        assert!(parse_hex_quantity("0xzz").is_err());
    }

    #[test]
    fn test_connection_variants() {
        let mut state = WalletState::default();
        assert_eq!(state.connection(), ConnectionState::NotInstalled);

        state.is_installed = true;
        assert_eq!(state.connection(), ConnectionState::Disconnected);

        state.is_connecting = true;
        assert_eq!(state.connection(), ConnectionState::Connecting);

        state.is_connecting = false;
        state.account = "0xabc".to_string();
        assert_eq!(state.connection(), ConnectionState::ConnectedWrongNetwork);

        state.is_correct_network = true;
        assert_eq!(state.connection(), ConnectionState::ConnectedCorrectNetwork);
    }

    #[test]
    fn test_short_account() {
        let state = WalletState {
            account: "0x1234567890abcdef1234567890abcdef12345678".to_string(),
            ..Default::default()
        };
        assert_eq!(state.short_account(), "0x1234...5678");
    }

    #[test]
    fn test_short_account_non_ascii() {
        let state = WalletState {
            account: "0xé234567890abcdef56é8".to_string(),
            ..Default::default()
        };
        assert_eq!(state.short_account(), "0xé234...56é8");
    }

    #[test]
    fn test_add_chain_params_shape() {
        let params = serde_json::to_value(ChainParams::base_sepolia()).unwrap();
        assert_eq!(params["chainId"], "0x14a34");
        assert_eq!(params["nativeCurrency"]["decimals"], 18);
        assert_eq!(params["rpcUrls"][0], "https://sepolia.base.org");
        assert_eq!(params["blockExplorerUrls"][0], "https://sepolia.basescan.org");
    }
}
