// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Hosted Data Service Interfaces
//!
//! Read/write and change-feed contracts for the hosted relational data
//! service, following the same port/adapter split as the rest of the crate:
//! the traits live here, the HTTP and WebSocket implementations live in
//! `crate::infrastructure`.
//!
//! | Trait | Purpose | Implementations |
//! |-------|---------|-----------------|
//! | `DataService` | table reads and upserts | `PostgrestClient` |
//! | `ChangeFeed` | push notifications for inserted/changed rows | `RealtimeClient` |
//!
//! Rows cross this boundary as `serde_json::Value`; typed decoding happens in
//! `crate::application::data_operations`.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::domain::records::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Declarative read against one table: equality filters, ordering, limit.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: Table,
    pub filters: Vec<(String, String)>,
    pub order: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl TableQuery {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Data service returned HTTP {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Failed to decode rows: {0}")]
    Decode(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Data service is not configured: {0}")]
    NotConfigured(String),
}

/// Storage interface for the hosted tables.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Rows matching the query.
    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, DataError>;

    /// Exactly one row, or `None` when nothing matches.
    async fn select_single(&self, query: &TableQuery) -> Result<Option<Value>, DataError>;

    /// Insert or merge a row on the given conflict column, returning the
    /// stored row.
    async fn upsert(&self, table: Table, row: Value, on_conflict: &str) -> Result<Value, DataError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Subscribe to every kind; only used in filters.
    All,
}

impl ChangeKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
            ChangeKind::All => "*",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            "*" => Some(ChangeKind::All),
            _ => None,
        }
    }
}

/// Which row changes a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    /// Channel name, e.g. `reasoning:<execution id>`.
    pub channel: String,
    pub table: Table,
    pub kind: ChangeKind,
    /// Equality filter column and value.
    pub column: String,
    pub value: String,
}

impl ChangeFilter {
    pub fn new(
        channel: impl Into<String>,
        table: Table,
        kind: ChangeKind,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            table,
            kind,
            column: column.into(),
            value: value.into(),
        }
    }

    /// `column=eq.value` form used on the wire.
    pub fn filter_expression(&self) -> String {
        format!("{}=eq.{}", self.column, self.value)
    }

    /// Whether a pushed row belongs to this subscription.
    pub fn matches(&self, kind: ChangeKind, record: &Value) -> bool {
        let kind_matches = self.kind == ChangeKind::All || self.kind == kind;
        let value_matches = match record.get(&self.column) {
            Some(Value::String(s)) => s == &self.value,
            Some(other) => other.to_string() == self.value,
            None => false,
        };
        kind_matches && value_matches
    }
}

/// One pushed row change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub record: Value,
}

/// Receiving end of a subscription. Dropping it releases the subscription.
pub struct ChangeStream {
    receiver: mpsc::Receiver<ChangeRecord>,
    _release: Option<oneshot::Sender<()>>,
}

impl ChangeStream {
    /// `release` is dropped together with the stream, which tells the feed
    /// to leave the channel.
    pub fn new(receiver: mpsc::Receiver<ChangeRecord>, release: oneshot::Sender<()>) -> Self {
        Self {
            receiver,
            _release: Some(release),
        }
    }

    /// Stream with no release signal (the producer stops when the receiver
    /// is dropped).
    pub fn detached(receiver: mpsc::Receiver<ChangeRecord>) -> Self {
        Self {
            receiver,
            _release: None,
        }
    }

    /// Next pushed change, or `None` once the feed closed.
    pub async fn next(&mut self) -> Option<ChangeRecord> {
        self.receiver.recv().await
    }
}

impl fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStream")
            .field("buffered", &self.receiver.len())
            .field("releases_on_drop", &self._release.is_some())
            .finish()
    }
}

/// Push interface for row changes.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeStream, DataError>;
}
