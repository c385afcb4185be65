use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::market::MarketSnapshot;

/// Strategy family an agent is configured to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Momentum,
    Yield,
    Arbitrage,
    Dca,
    Grid,
    Hedge,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Momentum => "momentum",
            StrategyKind::Yield => "yield",
            StrategyKind::Arbitrage => "arbitrage",
            StrategyKind::Dca => "dca",
            StrategyKind::Grid => "grid",
            StrategyKind::Hedge => "hedge",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "momentum" => Ok(StrategyKind::Momentum),
            "yield" | "yield_farming" => Ok(StrategyKind::Yield),
            "arbitrage" | "arb" => Ok(StrategyKind::Arbitrage),
            "dca" => Ok(StrategyKind::Dca),
            "grid" => Ok(StrategyKind::Grid),
            "hedge" | "hedging" => Ok(StrategyKind::Hedge),
            _ => Err("invalid strategy; expected momentum|yield|arbitrage|dca|grid|hedge"),
        }
    }
}

/// Risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "conservative" => Ok(RiskLevel::Low),
            "medium" | "moderate" => Ok(RiskLevel::Medium),
            "high" | "aggressive" => Ok(RiskLevel::High),
            _ => Err("invalid risk level; expected low|medium|high"),
        }
    }
}

/// A token balance held by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub token_address: String,
    pub symbol: String,
    pub balance: Decimal,
    pub value_usd: Decimal,
}

/// Everything a strategy needs to know about one trading identity.
///
/// Loaded fresh before each cycle. Only settlement writes back to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub id: String,
    pub strategy: StrategyKind,
    pub risk_level: RiskLevel,
    /// Capital under management, MON
    pub total_capital: Decimal,
    pub total_pnl: Decimal,
    /// Running max drawdown as a fraction (0-1)
    pub max_drawdown: Decimal,
    /// Native balance of the trading wallet. `None` blocks trading.
    pub wallet_balance: Option<Decimal>,
    pub holdings: Vec<Holding>,
    /// Daily loss limit in percent of capital
    pub daily_loss_limit: Decimal,
    pub max_daily_trades: u32,
}

impl AgentContext {
    pub fn holding(&self, token_address: &str) -> Option<&Holding> {
        self.holdings
            .iter()
            .find(|h| h.token_address.eq_ignore_ascii_case(token_address))
    }

    /// Balance held for a token, zero if none
    pub fn held_balance(&self, token_address: &str) -> Decimal {
        self.holding(token_address)
            .map(|h| h.balance)
            .unwrap_or(Decimal::ZERO)
    }

    /// Re-price holdings from this cycle's snapshots
    pub fn revalue_holdings(&mut self, markets: &[MarketSnapshot]) {
        for holding in &mut self.holdings {
            if let Some(snapshot) = markets
                .iter()
                .find(|m| m.token_address.eq_ignore_ascii_case(&holding.token_address))
            {
                holding.value_usd = holding.balance * snapshot.price_usd;
            }
        }
    }
}
