use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::signal::{TradeAction, TradeSignal};
use crate::error::{AgentflowError, Result};

/// Execution venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    /// Launch platform bonding-curve AMM
    BondingCurve,
    /// General DEX aggregator
    Aggregator,
    /// Solver-based swap network
    Solver,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::BondingCurve => "bonding_curve",
            Venue::Aggregator => "aggregator",
            Venue::Solver => "solver",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Venue {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bonding_curve" | "curve" => Ok(Venue::BondingCurve),
            "aggregator" | "dex" => Ok(Venue::Aggregator),
            "solver" => Ok(Venue::Solver),
            _ => Err("invalid venue; expected bonding_curve|aggregator|solver"),
        }
    }
}

/// Execution status. `Executing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Executing,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Executing => "EXECUTING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Executing)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ExecutionStatus {
    type Error = AgentflowError;

    fn try_from(raw: &str) -> Result<Self> {
        match raw {
            "EXECUTING" => Ok(ExecutionStatus::Executing),
            "SUCCESS" => Ok(ExecutionStatus::Success),
            "FAILED" => Ok(ExecutionStatus::Failed),
            other => Err(AgentflowError::Validation(format!(
                "unknown execution status '{}'",
                other
            ))),
        }
    }
}

/// Successful router output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFill {
    pub tx_hash: String,
    pub venue: Venue,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub gas_used: Option<u64>,
    pub attempts: u8,
    pub slippage_bps: u32,
    pub used_permit: bool,
}

/// Persistent record of one attempted trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub agent_id: String,
    pub kind: TradeAction,
    pub params: TradeSignal,
    pub status: ExecutionStatus,
    pub tx_hash: Option<String>,
    pub pnl_usd: Option<Decimal>,
    pub gas_used: Option<u64>,
    pub result: Option<RouteFill>,
    pub executed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_msg: Option<String>,
}

impl Execution {
    /// Open a new record in the `Executing` state
    pub fn begin(agent_id: impl Into<String>, signal: TradeSignal) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            kind: signal.action,
            params: signal,
            status: ExecutionStatus::Executing,
            tx_hash: None,
            pnl_usd: None,
            gas_used: None,
            result: None,
            executed_at: Utc::now(),
            completed_at: None,
            error_msg: None,
        }
    }

    fn ensure_open(&self, to: ExecutionStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(AgentflowError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    pub fn mark_success(&mut self, fill: RouteFill, pnl_usd: Decimal) -> Result<()> {
        self.ensure_open(ExecutionStatus::Success)?;
        self.status = ExecutionStatus::Success;
        self.tx_hash = Some(fill.tx_hash.clone());
        self.gas_used = fill.gas_used;
        self.pnl_usd = Some(pnl_usd);
        self.result = Some(fill);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_failed(&mut self, error_msg: impl Into<String>) -> Result<()> {
        self.ensure_open(ExecutionStatus::Failed)?;
        self.status = ExecutionStatus::Failed;
        self.error_msg = Some(error_msg.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
