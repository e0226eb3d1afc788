// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod backend_client;
pub mod data_service;
pub mod event_bus;
pub mod realtime;
pub mod wallet_provider;

pub use backend_client::HttpAgentBackend;
pub use data_service::PostgrestClient;
pub use event_bus::EventBus;
pub use realtime::RealtimeClient;
pub use wallet_provider::JsonRpcWalletProvider;
