// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for Spark CLI

pub mod chat;
pub mod config;
pub mod dashboard;
pub mod executions;
pub mod wallet;

pub use self::chat::ChatArgs;
pub use self::config::ConfigCommand;
pub use self::dashboard::DashboardCommand;
pub use self::executions::ExecutionsCommand;
pub use self::wallet::WalletCommand;

use anyhow::{Context, Result};
use std::path::PathBuf;

use spark_core::domain::config::SparkConfig;
use spark_core::infrastructure::HttpAgentBackend;

pub fn load_config(config_override: Option<PathBuf>) -> Result<SparkConfig> {
    SparkConfig::load_or_default(config_override).context("Failed to load configuration")
}

pub fn agent_backend(config: &SparkConfig) -> Result<HttpAgentBackend> {
    HttpAgentBackend::with_timeout(config.backend.url.clone(), config.backend.request_timeout)
        .context("Failed to build agent backend client")
}
