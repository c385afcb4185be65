//! Static risk tier table

use crate::domain::RiskLevel;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Trading limits for one risk tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParameters {
    /// Fraction of capital sizeable per trade
    pub max_position_pct: Decimal,
    /// Minimum confidence for a signal to be proposed
    pub min_confidence: u8,
    /// Drawdown fraction above which trading stops
    pub max_drawdown_limit: Decimal,
    pub slippage_tolerance_bps: u32,
    /// Spread threshold for the arbitrage strategy, in percentage points
    pub arbitrage_spread_threshold: f64,
}

const LOW: RiskParameters = RiskParameters {
    max_position_pct: dec!(0.05),
    min_confidence: 75,
    max_drawdown_limit: dec!(0.10),
    slippage_tolerance_bps: 50,
    arbitrage_spread_threshold: 1.5,
};

const MEDIUM: RiskParameters = RiskParameters {
    max_position_pct: dec!(0.10),
    min_confidence: 60,
    max_drawdown_limit: dec!(0.20),
    slippage_tolerance_bps: 100,
    arbitrage_spread_threshold: 2.0,
};

const HIGH: RiskParameters = RiskParameters {
    max_position_pct: dec!(0.20),
    min_confidence: 45,
    max_drawdown_limit: dec!(0.35),
    slippage_tolerance_bps: 150,
    arbitrage_spread_threshold: 3.0,
};

impl RiskParameters {
    pub fn for_level(level: RiskLevel) -> &'static RiskParameters {
        match level {
            RiskLevel::Low => &LOW,
            RiskLevel::Medium => &MEDIUM,
            RiskLevel::High => &HIGH,
        }
    }
}
