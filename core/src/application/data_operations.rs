// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Data Operations
//!
//! Typed reads, writes and subscriptions over the hosted tables. The dashboard
//! queries are thin wrappers around these.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** map [`TableQuery`] results to record types, fan out aggregate reads

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::records::{
    AgentDecision, AgentExecution, AgentReasoning, Balance, ExecutedTransaction, ExecutionDetails,
    NewPortfolio, Portfolio, PortfolioOverview, RiskAssessment, Table,
};
use crate::domain::repository::{
    ChangeFeed, ChangeFilter, ChangeKind, ChangeStream, DataError, DataService, SortOrder,
    TableQuery,
};

pub const DEFAULT_EXECUTIONS_LIMIT: usize = 10;
pub const DEFAULT_TRANSACTIONS_LIMIT: usize = 20;
pub const OVERVIEW_EXECUTIONS_LIMIT: usize = 5;
pub const OVERVIEW_TRANSACTIONS_LIMIT: usize = 10;
/// Chain id stored for portfolios created without one.
pub const DEFAULT_CHAIN_ID: i64 = 1;

fn decode<T: DeserializeOwned>(row: Value) -> Result<T, DataError> {
    serde_json::from_value(row).map_err(|e| DataError::Decode(e.to_string()))
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DataError> {
    rows.into_iter().map(decode).collect()
}

/// Subscription yielding decoded rows. Dropping it releases the subscription.
pub struct RowStream<T> {
    inner: ChangeStream,
    _row: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> RowStream<T> {
    pub fn new(inner: ChangeStream) -> Self {
        Self {
            inner,
            _row: PhantomData,
        }
    }

    /// Next pushed row, or `None` once the feed closed.
    pub async fn next(&mut self) -> Option<Result<T, DataError>> {
        let change = self.inner.next().await?;
        Some(decode(change.record))
    }
}

#[derive(Clone)]
pub struct DataOperations {
    data: Arc<dyn DataService>,
    feed: Option<Arc<dyn ChangeFeed>>,
}

impl DataOperations {
    pub fn new(data: Arc<dyn DataService>, feed: Option<Arc<dyn ChangeFeed>>) -> Self {
        Self { data, feed }
    }

    async fn rows<T: DeserializeOwned>(&self, query: TableQuery) -> Result<Vec<T>, DataError> {
        decode_rows(self.data.select(&query).await?)
    }

    async fn single<T: DeserializeOwned>(&self, query: TableQuery) -> Result<Option<T>, DataError> {
        self.data.select_single(&query).await?.map(decode).transpose()
    }

    async fn subscribe<T: DeserializeOwned>(&self, filter: ChangeFilter) -> Result<RowStream<T>, DataError> {
        let feed = self
            .feed
            .as_ref()
            .ok_or_else(|| DataError::NotConfigured("no change feed available".to_string()))?;
        Ok(RowStream::new(feed.subscribe(filter).await?))
    }

    // Portfolios

    pub async fn portfolio_by_wallet_address(&self, wallet_address: &str) -> Result<Option<Portfolio>, DataError> {
        self.single(TableQuery::from(Table::Portfolios).eq("wallet_address", wallet_address))
            .await
    }

    pub async fn portfolios_by_user_id(&self, user_id: &str) -> Result<Vec<Portfolio>, DataError> {
        self.rows(
            TableQuery::from(Table::Portfolios)
                .eq("user_id", user_id)
                .order_by("created_at", SortOrder::Descending),
        )
        .await
    }

    pub async fn portfolio_by_id(&self, portfolio_id: &str) -> Result<Option<Portfolio>, DataError> {
        self.single(TableQuery::from(Table::Portfolios).eq("id", portfolio_id))
            .await
    }

    /// Create the portfolio for a wallet, or return the existing one.
    pub async fn create_portfolio(
        &self,
        user_id: &str,
        wallet_address: &str,
        chain_id: Option<i64>,
    ) -> Result<Portfolio, DataError> {
        let row = serde_json::to_value(NewPortfolio {
            user_id: user_id.to_string(),
            wallet_address: wallet_address.to_string(),
            chain_id: chain_id.unwrap_or(DEFAULT_CHAIN_ID),
        })
        .map_err(|e| DataError::Decode(e.to_string()))?;

        decode(self.data.upsert(Table::Portfolios, row, "wallet_address").await?)
    }

    // Balances

    pub async fn balances_by_portfolio_id(&self, portfolio_id: &str) -> Result<Vec<Balance>, DataError> {
        self.rows(
            TableQuery::from(Table::Balances)
                .eq("portfolio_id", portfolio_id)
                .order_by("created_at", SortOrder::Descending),
        )
        .await
    }

    pub async fn subscribe_balances(&self, portfolio_id: &str) -> Result<RowStream<Balance>, DataError> {
        self.subscribe(ChangeFilter::new(
            format!("balances:{}", portfolio_id),
            Table::Balances,
            ChangeKind::All,
            "portfolio_id",
            portfolio_id,
        ))
        .await
    }

    // Executions

    pub async fn executions_by_portfolio_id(
        &self,
        portfolio_id: &str,
        limit: usize,
    ) -> Result<Vec<AgentExecution>, DataError> {
        self.rows(
            TableQuery::from(Table::AgentExecutions)
                .eq("portfolio_id", portfolio_id)
                .order_by("created_at", SortOrder::Descending)
                .limit(limit),
        )
        .await
    }

    pub async fn execution_by_id(&self, execution_id: &str) -> Result<Option<AgentExecution>, DataError> {
        self.single(TableQuery::from(Table::AgentExecutions).eq("execution_id", execution_id))
            .await
    }

    pub async fn subscribe_executions(&self, portfolio_id: &str) -> Result<RowStream<AgentExecution>, DataError> {
        self.subscribe(ChangeFilter::new(
            format!("executions:{}", portfolio_id),
            Table::AgentExecutions,
            ChangeKind::All,
            "portfolio_id",
            portfolio_id,
        ))
        .await
    }

    // Decisions, reasoning, risk

    pub async fn decisions_by_execution_id(&self, execution_id: &str) -> Result<Vec<AgentDecision>, DataError> {
        self.rows(
            TableQuery::from(Table::AgentDecisions)
                .eq("execution_id", execution_id)
                .order_by("created_at", SortOrder::Ascending),
        )
        .await
    }

    pub async fn reasoning_by_execution_id(&self, execution_id: &str) -> Result<Vec<AgentReasoning>, DataError> {
        self.rows(
            TableQuery::from(Table::AgentReasoning)
                .eq("execution_id", execution_id)
                .order_by("step_number", SortOrder::Ascending),
        )
        .await
    }

    pub async fn subscribe_reasoning(&self, execution_id: &str) -> Result<RowStream<AgentReasoning>, DataError> {
        self.subscribe(ChangeFilter::new(
            format!("reasoning:{}", execution_id),
            Table::AgentReasoning,
            ChangeKind::Insert,
            "execution_id",
            execution_id,
        ))
        .await
    }

    pub async fn risks_by_execution_id(&self, execution_id: &str) -> Result<Vec<RiskAssessment>, DataError> {
        self.rows(
            TableQuery::from(Table::RiskAssessments)
                .eq("execution_id", execution_id)
                .order_by("created_at", SortOrder::Ascending),
        )
        .await
    }

    // Transactions

    pub async fn transactions_by_portfolio_id(
        &self,
        portfolio_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutedTransaction>, DataError> {
        self.rows(
            TableQuery::from(Table::ExecutedTransactions)
                .eq("portfolio_id", portfolio_id)
                .order_by("created_at", SortOrder::Descending)
                .limit(limit),
        )
        .await
    }

    pub async fn subscribe_transactions(
        &self,
        portfolio_id: &str,
    ) -> Result<RowStream<ExecutedTransaction>, DataError> {
        self.subscribe(ChangeFilter::new(
            format!("transactions:{}", portfolio_id),
            Table::ExecutedTransactions,
            ChangeKind::Insert,
            "portfolio_id",
            portfolio_id,
        ))
        .await
    }

    // Aggregates

    pub async fn execution_details(&self, execution_id: &str) -> Result<ExecutionDetails, DataError> {
        let (execution, decisions, reasoning, risks) = tokio::try_join!(
            self.execution_by_id(execution_id),
            self.decisions_by_execution_id(execution_id),
            self.reasoning_by_execution_id(execution_id),
            self.risks_by_execution_id(execution_id),
        )?;

        Ok(ExecutionDetails {
            execution,
            decisions,
            reasoning,
            risks,
        })
    }

    pub async fn portfolio_overview(&self, portfolio_id: &str) -> Result<PortfolioOverview, DataError> {
        let (portfolio, balances, recent_executions, recent_transactions) = tokio::try_join!(
            self.portfolio_by_id(portfolio_id),
            self.balances_by_portfolio_id(portfolio_id),
            self.executions_by_portfolio_id(portfolio_id, OVERVIEW_EXECUTIONS_LIMIT),
            self.transactions_by_portfolio_id(portfolio_id, OVERVIEW_TRANSACTIONS_LIMIT),
        )?;

        Ok(PortfolioOverview {
            portfolio,
            balances,
            recent_executions,
            recent_transactions,
        })
    }
}
