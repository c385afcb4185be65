//! Pre-trade risk guard
//!
//! Validates a candidate signal against agent limits and today's trading history.
//! Checks run in a fixed order and the first failure wins. Ledger reads that fail
//! are treated as the worst possible value, so an unreachable store blocks trading.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::{AgentContext, TradeSignal};
use crate::settlement::LedgerStore;
use crate::strategy::RiskParameters;

#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    /// Smallest tradable amount
    #[serde(default = "default_min_trade_size")]
    pub min_trade_size: Decimal,
    /// Largest buy as a fraction of total capital
    #[serde(default = "default_max_buy_capital_fraction")]
    pub max_buy_capital_fraction: Decimal,
}

fn default_min_trade_size() -> Decimal {
    dec!(0.01)
}

fn default_max_buy_capital_fraction() -> Decimal {
    dec!(0.5)
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            min_trade_size: default_min_trade_size(),
            max_buy_capital_fraction: default_max_buy_capital_fraction(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskCheckResult {
    Passed,
    Blocked(BlockReason),
}

impl RiskCheckResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, RiskCheckResult::Passed)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, RiskCheckResult::Blocked(_))
    }
}

/// Why a signal was rejected. `None` readings mean the ledger could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockReason {
    DrawdownExceeded {
        limit: Decimal,
        current: Decimal,
    },
    DailyLossExceeded {
        limit_pct: Decimal,
        current_pct: Option<Decimal>,
    },
    DailyTradeLimitReached {
        limit: u32,
        current: Option<u32>,
    },
    BelowMinimumSize {
        minimum: Decimal,
        requested: Decimal,
    },
    ExceedsCapitalFraction {
        limit: Decimal,
        requested: Decimal,
    },
    WalletBalanceUnknown,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::DrawdownExceeded { limit, current } => {
                write!(f, "Drawdown {} exceeds tier limit {}", current, limit)
            }
            BlockReason::DailyLossExceeded {
                limit_pct,
                current_pct: Some(current),
            } => {
                write!(f, "Daily loss {}% exceeds limit {}%", current.round_dp(2), limit_pct)
            }
            BlockReason::DailyLossExceeded {
                limit_pct,
                current_pct: None,
            } => {
                write!(f, "Daily loss unknown (ledger unavailable), limit {}%", limit_pct)
            }
            BlockReason::DailyTradeLimitReached {
                limit,
                current: Some(current),
            } => {
                write!(f, "Daily trades {} reached limit {}", current, limit)
            }
            BlockReason::DailyTradeLimitReached {
                limit,
                current: None,
            } => {
                write!(f, "Daily trade count unknown (ledger unavailable), limit {}", limit)
            }
            BlockReason::BelowMinimumSize { minimum, requested } => {
                write!(f, "Amount {} below minimum trade size {}", requested, minimum)
            }
            BlockReason::ExceedsCapitalFraction { limit, requested } => {
                write!(f, "Buy of {} exceeds capital limit {}", requested, limit)
            }
            BlockReason::WalletBalanceUnknown => write!(f, "Wallet balance unknown"),
        }
    }
}

pub struct RiskGuard {
    ledger: Arc<dyn LedgerStore>,
    settings: RiskSettings,
}

impl RiskGuard {
    pub fn new(ledger: Arc<dyn LedgerStore>, settings: RiskSettings) -> Self {
        Self { ledger, settings }
    }

    pub async fn check_risk_limits(&self, agent: &AgentContext, signal: &TradeSignal) -> RiskCheckResult {
        self.check_on(agent, signal, Utc::now().date_naive()).await
    }

    #[instrument(skip(self, agent, signal), fields(agent = %agent.id, action = %signal.action))]
    pub async fn check_on(
        &self,
        agent: &AgentContext,
        signal: &TradeSignal,
        day: NaiveDate,
    ) -> RiskCheckResult {
        let result = self.evaluate(agent, signal, day).await;
        match &result {
            RiskCheckResult::Passed => debug!("risk checks passed"),
            RiskCheckResult::Blocked(reason) => info!(reason = %reason, "signal blocked"),
        }
        result
    }

    async fn evaluate(&self, agent: &AgentContext, signal: &TradeSignal, day: NaiveDate) -> RiskCheckResult {
        let params = RiskParameters::for_level(agent.risk_level);

        // 1. Drawdown
        if agent.max_drawdown > params.max_drawdown_limit {
            return RiskCheckResult::Blocked(BlockReason::DrawdownExceeded {
                limit: params.max_drawdown_limit,
                current: agent.max_drawdown,
            });
        }

        // 2. Daily loss
        let loss_pct = match self.ledger.daily_realized_pnl(&agent.id, day).await {
            Ok(pnl) => Some(loss_percent(pnl, agent.total_capital)),
            Err(e) => {
                warn!(agent = %agent.id, error = %e, "daily loss lookup failed, blocking");
                None
            }
        };
        match loss_pct {
            Some(pct) if pct <= agent.daily_loss_limit => {}
            current_pct => {
                return RiskCheckResult::Blocked(BlockReason::DailyLossExceeded {
                    limit_pct: agent.daily_loss_limit,
                    current_pct,
                });
            }
        }

        // 3. Daily trade count
        let count = match self.ledger.daily_trade_count(&agent.id, day).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(agent = %agent.id, error = %e, "daily trade count lookup failed, blocking");
                None
            }
        };
        match count {
            Some(count) if count < agent.max_daily_trades => {}
            current => {
                return RiskCheckResult::Blocked(BlockReason::DailyTradeLimitReached {
                    limit: agent.max_daily_trades,
                    current,
                });
            }
        }

        // 4. Minimum size
        if signal.amount < self.settings.min_trade_size {
            return RiskCheckResult::Blocked(BlockReason::BelowMinimumSize {
                minimum: self.settings.min_trade_size,
                requested: signal.amount,
            });
        }

        // 5. Buy cap
        if signal.action.is_buy() {
            let limit = agent.total_capital * self.settings.max_buy_capital_fraction;
            if signal.amount > limit {
                return RiskCheckResult::Blocked(BlockReason::ExceedsCapitalFraction {
                    limit,
                    requested: signal.amount,
                });
            }
        }

        if agent.wallet_balance.is_none() {
            return RiskCheckResult::Blocked(BlockReason::WalletBalanceUnknown);
        }

        RiskCheckResult::Passed
    }
}

/// Today's loss as a percentage of capital; gains count as zero loss
fn loss_percent(daily_pnl: Decimal, total_capital: Decimal) -> Decimal {
    let loss = (-daily_pnl).max(Decimal::ZERO);
    if loss.is_zero() {
        return Decimal::ZERO;
    }
    if total_capital <= Decimal::ZERO {
        return Decimal::MAX;
    }
    loss / total_capital * dec!(100)
}
