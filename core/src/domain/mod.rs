// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Entities, state machines and port traits with no I/O of their own.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure model shared by the application and infrastructure layers

pub mod config;
pub mod execution;
pub mod message;
pub mod poller;
pub mod records;
pub mod repository;
pub mod wallet;
