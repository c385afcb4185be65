use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DelegationStatus {
    Active,
    Withdrawn,
}

impl DelegationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegationStatus::Active => "ACTIVE",
            DelegationStatus::Withdrawn => "WITHDRAWN",
        }
    }
}

/// Third-party capital contributed to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    pub id: Uuid,
    pub agent_id: String,
    pub amount: Decimal,
    pub status: DelegationStatus,
    pub accumulated_pnl: Decimal,
    pub lockup_ends_at: Option<DateTime<Utc>>,
    pub on_chain_delegation_id: Option<String>,
}

impl Delegation {
    pub fn new(agent_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            amount,
            status: DelegationStatus::Active,
            accumulated_pnl: Decimal::ZERO,
            lockup_ends_at: None,
            on_chain_delegation_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DelegationStatus::Active
    }
}

/// Cost-basis row for one (agent, token) pair. Prices and costs are in MON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPosition {
    pub agent_id: String,
    pub token_address: String,
    pub symbol: String,
    pub balance: Decimal,
    pub avg_buy_price: Decimal,
    pub total_cost: Decimal,
    pub realized_pnl: Decimal,
}

impl TokenPosition {
    pub fn empty(
        agent_id: impl Into<String>,
        token_address: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            token_address: token_address.into(),
            symbol: symbol.into(),
            balance: Decimal::ZERO,
            avg_buy_price: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }
}

/// Rolling performance figures stored on the agent row
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub sharpe_ratio: f64,
    pub max_drawdown: Decimal,
    pub win_rate: f64,
    pub trade_count: u32,
    pub total_pnl: Decimal,
}
