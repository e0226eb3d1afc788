// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Records
//!
//! Rows mirrored 1:1 from the hosted data service. No local invariants beyond
//! what the service guarantees; timestamps are kept as the service's strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical tables exposed by the hosted data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Portfolios,
    Balances,
    AgentExecutions,
    AgentDecisions,
    AgentReasoning,
    RiskAssessments,
    ExecutedTransactions,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Portfolios => "portfolios",
            Table::Balances => "balances",
            Table::AgentExecutions => "agent_executions",
            Table::AgentDecisions => "agent_decisions",
            Table::AgentReasoning => "agent_reasoning",
            Table::RiskAssessments => "risk_assessments",
            Table::ExecutedTransactions => "executed_transactions",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub user_id: String,
    pub wallet_address: String,
    pub chain_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Insert shape for `portfolios` (the service assigns `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPortfolio {
    pub user_id: String,
    pub wallet_address: String,
    pub chain_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub portfolio_id: String,
    pub asset: String,
    pub amount: f64,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentExecution {
    pub execution_id: String,
    pub portfolio_id: String,
    #[serde(default)]
    pub state_data: serde_json::Value,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub execution_id: String,
    pub portfolio_id: String,
    pub agent_name: String,
    pub decision_type: String,
    #[serde(default)]
    pub decision_data: serde_json::Value,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReasoning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub execution_id: String,
    pub agent_name: String,
    pub step_number: i64,
    pub reasoning_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub execution_id: String,
    pub portfolio_id: String,
    pub protocol: String,
    pub risk_score: f64,
    #[serde(default)]
    pub risk_factors: serde_json::Value,
    pub safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub execution_id: String,
    pub portfolio_id: String,
    pub tx_hash: String,
    pub protocol: String,
    pub action: String,
    pub amount: f64,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Everything recorded about one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDetails {
    pub execution: Option<AgentExecution>,
    pub decisions: Vec<AgentDecision>,
    pub reasoning: Vec<AgentReasoning>,
    pub risks: Vec<RiskAssessment>,
}

/// Portfolio with its balances and recent activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub portfolio: Option<Portfolio>,
    pub balances: Vec<Balance>,
    pub recent_executions: Vec<AgentExecution>,
    pub recent_transactions: Vec<ExecutedTransaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_row_decodes() {
        let row = serde_json::json!({
            "id": "t1",
            "execution_id": "e1",
            "portfolio_id": "p1",
            "tx_hash": "0xabc",
            "protocol": "aave",
            "action": "deposit",
            "amount": 250.5,
            "status": "pending",
            "created_at": "2026-03-01T10:00:00Z"
        });
        let tx: ExecutedTransaction = serde_json::from_value(row).unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.amount, 250.5);
    }

    #[test]
    fn test_reasoning_row_without_optional_fields() {
        let row = serde_json::json!({
            "execution_id": "e1",
            "agent_name": "risk_agent",
            "step_number": 3,
            "reasoning_text": "TVL is stable"
        });
        let reasoning: AgentReasoning = serde_json::from_value(row).unwrap();
        assert!(reasoning.id.is_none());
        assert_eq!(reasoning.step_number, 3);
    }
}
