// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Spark Core
//!
//! Client-side core of the Spark DeFi agent product: the chat execution
//! poller, the wallet connector and the dashboard data queries, together with
//! the adapters for the agent backend, the hosted data service and the wallet
//! provider.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services and infrastructure adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
