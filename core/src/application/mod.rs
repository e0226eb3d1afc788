// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod chat_session;
pub mod dashboard;
pub mod data_operations;
pub mod wallet_connector;

pub use chat_session::ChatSession;
pub use dashboard::{LiveReasoning, LiveTransactions, Resource};
pub use data_operations::DataOperations;
pub use wallet_connector::WalletConnector;
