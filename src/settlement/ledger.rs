//! Ledger store boundary

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AgentContext, Delegation, Execution, PerformanceMetrics, TokenPosition};
use crate::error::Result;

/// Agent row fields rewritten on a successful settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetricsUpdate {
    pub agent_id: String,
    pub metrics: PerformanceMetrics,
}

/// Pro-rata credit to a single delegation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationCredit {
    pub delegation_id: Uuid,
    /// Net of performance fee for gains, unadjusted for losses
    pub amount: Decimal,
    pub fee: Decimal,
}

/// Every ledger write produced by settling one execution.
///
/// Stores must apply a batch atomically: either every row lands or none does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub execution: Execution,
    pub agent_update: Option<AgentMetricsUpdate>,
    pub position: Option<TokenPosition>,
    pub delegation_credits: Vec<DelegationCredit>,
}

impl SettlementBatch {
    /// Terminal execution record with no derived updates
    pub fn execution_only(execution: Execution) -> Self {
        Self {
            execution,
            agent_update: None,
            position: None,
            delegation_credits: Vec::new(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Agent ids eligible for scheduling
    async fn active_agents(&self) -> Result<Vec<String>>;

    /// Agent context with holdings, wallet balance left unset
    async fn load_agent(&self, agent_id: &str) -> Result<AgentContext>;

    async fn create_execution(&self, execution: &Execution) -> Result<()>;

    async fn get_execution(&self, id: Uuid) -> Result<Execution>;

    /// PnL of every SUCCESS execution, oldest first
    async fn successful_pnls(&self, agent_id: &str) -> Result<Vec<Decimal>>;

    /// Sum of PnL over SUCCESS executions completed on `day` (UTC)
    async fn daily_realized_pnl(&self, agent_id: &str, day: NaiveDate) -> Result<Decimal>;

    /// SUCCESS executions completed on `day` (UTC)
    async fn daily_trade_count(&self, agent_id: &str, day: NaiveDate) -> Result<u32>;

    async fn active_delegations(&self, agent_id: &str) -> Result<Vec<Delegation>>;

    async fn token_position(&self, agent_id: &str, token_address: &str)
        -> Result<Option<TokenPosition>>;

    async fn commit_settlement(&self, batch: &SettlementBatch) -> Result<()>;
}
