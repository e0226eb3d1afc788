// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dashboard Queries
//!
//! Fetch-on-key-change read models over [`DataOperations`]. Each query holds
//! an optional key (wallet address, portfolio id or execution id) and a
//! [`Resource`] with the last result; changing the key re-fetches. A `None`
//! key clears `loading` without fetching.
//!
//! [`LiveReasoning`] and [`LiveTransactions`] additionally keep a change-feed
//! subscription open and append pushed rows after the initial ones. The
//! subscription is released when the key changes or the query is dropped.
//!
//! Nothing is cached or de-duplicated: the hosted service is the only source
//! of truth.

use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::data_operations::{
    DataOperations, RowStream, DEFAULT_EXECUTIONS_LIMIT, DEFAULT_TRANSACTIONS_LIMIT,
};
use crate::domain::records::{
    AgentExecution, AgentReasoning, Balance, ExecutedTransaction, ExecutionDetails, Portfolio,
    PortfolioOverview,
};
use crate::domain::repository::DataError;
use crate::infrastructure::event_bus::{EventBus, EventReceiver};

/// `{data, loading, error}` triple exposed to views.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T: Default> Resource<T> {
    /// Initial state before the first fetch resolves.
    pub fn pending() -> Self {
        Self {
            data: T::default(),
            loading: true,
            error: None,
        }
    }
}

type Fetcher<T> = Box<dyn Fn(DataOperations, String) -> BoxFuture<'static, Result<T, DataError>> + Send + Sync>;

pub struct KeyedQuery<T> {
    ops: DataOperations,
    key: Option<String>,
    resource: Resource<T>,
    fetcher: Fetcher<T>,
}

pub type PortfolioQuery = KeyedQuery<Option<Portfolio>>;
pub type BalancesQuery = KeyedQuery<Vec<Balance>>;
pub type ExecutionsQuery = KeyedQuery<Vec<AgentExecution>>;
pub type ExecutionDetailsQuery = KeyedQuery<ExecutionDetails>;
pub type TransactionsQuery = KeyedQuery<Vec<ExecutedTransaction>>;
pub type PortfolioOverviewQuery = KeyedQuery<PortfolioOverview>;

impl<T: Default> KeyedQuery<T> {
    fn with_fetcher(ops: DataOperations, fetcher: Fetcher<T>) -> Self {
        Self {
            ops,
            key: None,
            resource: Resource::pending(),
            fetcher,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn resource(&self) -> &Resource<T> {
        &self.resource
    }

    pub fn into_resource(self) -> Resource<T> {
        self.resource
    }

    /// Change the key, re-fetching when it differs from the current one or
    /// the first fetch has not happened yet.
    pub async fn set_key(&mut self, key: Option<String>) -> &Resource<T> {
        if key == self.key && !self.resource.loading {
            return &self.resource;
        }
        self.key = key;
        self.refresh().await
    }

    /// Fetch again for the current key.
    pub async fn refresh(&mut self) -> &Resource<T> {
        let key = match self.key.clone() {
            Some(key) => key,
            None => {
                self.resource.loading = false;
                return &self.resource;
            }
        };

        self.resource.loading = true;
        match (self.fetcher)(self.ops.clone(), key).await {
            Ok(data) => {
                self.resource.data = data;
                self.resource.error = None;
            }
            Err(e) => {
                warn!("Dashboard query failed: {}", e);
                self.resource.error = Some(e.to_string());
            }
        }
        self.resource.loading = false;
        &self.resource
    }
}

impl PortfolioQuery {
    /// Portfolio owned by a wallet address.
    pub fn portfolio(ops: DataOperations) -> Self {
        Self::with_fetcher(
            ops,
            Box::new(|ops, wallet| {
                async move { ops.portfolio_by_wallet_address(&wallet).await }.boxed()
            }),
        )
    }
}

impl BalancesQuery {
    pub fn balances(ops: DataOperations) -> Self {
        Self::with_fetcher(
            ops,
            Box::new(|ops, portfolio_id| {
                async move { ops.balances_by_portfolio_id(&portfolio_id).await }.boxed()
            }),
        )
    }
}

impl ExecutionsQuery {
    pub fn executions(ops: DataOperations, limit: Option<usize>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_EXECUTIONS_LIMIT);
        Self::with_fetcher(
            ops,
            Box::new(move |ops, portfolio_id| {
                async move { ops.executions_by_portfolio_id(&portfolio_id, limit).await }.boxed()
            }),
        )
    }
}

impl ExecutionDetailsQuery {
    pub fn execution_details(ops: DataOperations) -> Self {
        Self::with_fetcher(
            ops,
            Box::new(|ops, execution_id| {
                async move { ops.execution_details(&execution_id).await }.boxed()
            }),
        )
    }
}

impl TransactionsQuery {
    pub fn transactions(ops: DataOperations, limit: Option<usize>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_TRANSACTIONS_LIMIT);
        Self::with_fetcher(
            ops,
            Box::new(move |ops, portfolio_id| {
                async move { ops.transactions_by_portfolio_id(&portfolio_id, limit).await }.boxed()
            }),
        )
    }
}

impl PortfolioOverviewQuery {
    pub fn portfolio_overview(ops: DataOperations) -> Self {
        Self::with_fetcher(
            ops,
            Box::new(|ops, portfolio_id| {
                async move { ops.portfolio_overview(&portfolio_id).await }.boxed()
            }),
        )
    }
}

type InitialRows<T> =
    Box<dyn Fn(DataOperations, String) -> BoxFuture<'static, Result<Vec<T>, DataError>> + Send + Sync>;
type Subscribe<T> =
    Box<dyn Fn(DataOperations, String) -> BoxFuture<'static, Result<RowStream<T>, DataError>> + Send + Sync>;

/// Keyed rows kept current by a change-feed subscription.
pub struct LiveRows<T> {
    ops: DataOperations,
    key: Option<String>,
    state: Arc<RwLock<Resource<Vec<T>>>>,
    updates: EventBus<usize>,
    pump: Option<JoinHandle<()>>,
    initial: InitialRows<T>,
    subscribe: Subscribe<T>,
}

/// Reasoning steps of one execution, in step order, growing as steps are
/// inserted.
pub type LiveReasoning = LiveRows<AgentReasoning>;
/// Transactions of one portfolio (newest first), growing as new ones are
/// inserted.
pub type LiveTransactions = LiveRows<ExecutedTransaction>;

impl<T> LiveRows<T>
where
    T: Clone + Send + Sync + 'static + serde::de::DeserializeOwned,
{
    fn build(ops: DataOperations, initial: InitialRows<T>, subscribe: Subscribe<T>) -> Self {
        Self {
            ops,
            key: None,
            state: Arc::new(RwLock::new(Resource::pending())),
            updates: EventBus::with_default_capacity(),
            pump: None,
            initial,
            subscribe,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn snapshot(&self) -> Resource<Vec<T>> {
        self.state.read().clone()
    }

    /// Row count after every pushed row.
    pub fn updates(&self) -> EventReceiver<usize> {
        self.updates.subscribe()
    }

    /// Release the current subscription (if any) and start over for `key`.
    ///
    /// The subscription is opened before the initial read so no insert is
    /// missed in between; a row inserted in that window may appear twice.
    pub async fn set_key(&mut self, key: Option<String>) {
        if key == self.key && self.pump.is_some() {
            return;
        }
        self.release();
        self.key = key.clone();
        // A released pump may still be between receiving a row and storing
        // it; it only holds a weak handle to the state it was started with.
        self.state = Arc::new(RwLock::new(Resource::pending()));

        let key = match key {
            Some(key) => key,
            None => {
                self.state.write().loading = false;
                return;
            }
        };

        let stream = match (self.subscribe)(self.ops.clone(), key.clone()).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(%key, "Live subscription failed: {}", e);
                self.state.write().error = Some(e.to_string());
                None
            }
        };

        match (self.initial)(self.ops.clone(), key.clone()).await {
            Ok(rows) => {
                let mut state = self.state.write();
                state.data = rows;
                state.loading = false;
            }
            Err(e) => {
                warn!(%key, "Initial live query failed: {}", e);
                let mut state = self.state.write();
                state.error = Some(e.to_string());
                state.loading = false;
            }
        }

        if let Some(stream) = stream {
            self.pump = Some(tokio::spawn(pump_rows(
                stream,
                Arc::downgrade(&self.state),
                self.updates.clone(),
                key,
            )));
        }
    }

    fn release(&mut self) {
        if let Some(pump) = self.pump.take() {
            debug!(key = ?self.key, "Releasing live subscription");
            pump.abort();
        }
    }
}

impl<T> Drop for LiveRows<T> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump_rows<T>(
    mut stream: RowStream<T>,
    state: Weak<RwLock<Resource<Vec<T>>>>,
    updates: EventBus<usize>,
    key: String,
) where
    T: serde::de::DeserializeOwned,
{
    while let Some(row) = stream.next().await {
        match row {
            Ok(row) => {
                let Some(state) = state.upgrade() else {
                    debug!(%key, "Key changed; dropping pushed row");
                    break;
                };
                let count = {
                    let mut state = state.write();
                    state.data.push(row);
                    state.data.len()
                };
                updates.publish(count);
            }
            Err(e) => warn!(%key, "Dropping undecodable pushed row: {}", e),
        }
    }
    debug!(%key, "Live subscription ended");
}

impl LiveReasoning {
    pub fn reasoning(ops: DataOperations) -> Self {
        Self::build(
            ops,
            Box::new(|ops, execution_id| {
                async move { ops.reasoning_by_execution_id(&execution_id).await }.boxed()
            }),
            Box::new(|ops, execution_id| {
                async move { ops.subscribe_reasoning(&execution_id).await }.boxed()
            }),
        )
    }
}

impl LiveTransactions {
    pub fn transactions(ops: DataOperations) -> Self {
        Self::build(
            ops,
            Box::new(|ops, portfolio_id| {
                async move {
                    ops.transactions_by_portfolio_id(&portfolio_id, DEFAULT_TRANSACTIONS_LIMIT)
                        .await
                }
                .boxed()
            }),
            Box::new(|ops, portfolio_id| {
                async move { ops.subscribe_transactions(&portfolio_id).await }.boxed()
            }),
        )
    }
}
