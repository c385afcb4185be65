use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Short timeframe label used across strategies
pub const SHORT_TIMEFRAME: &str = "5m";
/// Medium timeframe label
pub const MEDIUM_TIMEFRAME: &str = "1h";
/// Long timeframe label
pub const LONG_TIMEFRAME: &str = "4h";

/// Bonding curve progress is expressed in basis points of graduation
pub const CURVE_PROGRESS_MAX_BPS: u32 = 10_000;

/// Per-timeframe activity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeframeMetrics {
    pub price_change_pct: f64,
    pub volume_change_pct: f64,
    pub tx_count: u64,
}

/// Market-wide figures from the data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub price_usd: Decimal,
    pub volume_24h: Decimal,
    pub holders: u64,
    pub market_cap: Decimal,
    pub liquidity: Decimal,
    #[serde(default)]
    pub created_at_block: Option<u64>,
}

/// On-chain bonding curve state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CurveState {
    pub progress_bps: u32,
    pub is_graduated: bool,
    pub is_locked: bool,
}

impl CurveState {
    /// State for a token the curve cannot describe; it trades on other venues
    pub fn off_curve() -> Self {
        Self {
            progress_bps: 0,
            is_graduated: true,
            is_locked: false,
        }
    }
}

/// Immutable per-cycle view of one tradable token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub token_address: String,
    pub symbol: String,
    pub price_usd: Decimal,
    pub volume_24h: Decimal,
    pub holders: u64,
    pub market_cap: Decimal,
    pub liquidity: Decimal,
    pub metrics: HashMap<String, TimeframeMetrics>,
    pub bonding_curve_progress: u32,
    pub is_graduated: bool,
    pub is_locked: bool,
    pub created_at_block: Option<u64>,
    pub latest_block: Option<u64>,
}

impl MarketSnapshot {
    pub fn new(token_address: impl Into<String>, data: MarketData, curve: CurveState) -> Self {
        Self {
            token_address: token_address.into(),
            symbol: data.symbol,
            price_usd: data.price_usd,
            volume_24h: data.volume_24h,
            holders: data.holders,
            market_cap: data.market_cap,
            liquidity: data.liquidity,
            metrics: HashMap::new(),
            bonding_curve_progress: curve.progress_bps.min(CURVE_PROGRESS_MAX_BPS),
            is_graduated: curve.is_graduated,
            is_locked: curve.is_locked,
            created_at_block: data.created_at_block,
            latest_block: None,
        }
    }

    pub fn with_metrics(mut self, metrics: HashMap<String, TimeframeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_latest_block(mut self, latest_block: Option<u64>) -> Self {
        self.latest_block = latest_block;
        self
    }

    pub fn timeframe(&self, label: &str) -> Option<&TimeframeMetrics> {
        self.metrics.get(label)
    }

    pub fn short(&self) -> Option<&TimeframeMetrics> {
        self.timeframe(SHORT_TIMEFRAME)
    }

    pub fn medium(&self) -> Option<&TimeframeMetrics> {
        self.timeframe(MEDIUM_TIMEFRAME)
    }

    pub fn long(&self) -> Option<&TimeframeMetrics> {
        self.timeframe(LONG_TIMEFRAME)
    }

    /// Blocks since token creation, if both ends are known
    pub fn age_blocks(&self) -> Option<u64> {
        match (self.created_at_block, self.latest_block) {
            (Some(created), Some(latest)) => Some(latest.saturating_sub(created)),
            _ => None,
        }
    }

    /// Whether a new buy may target this token.
    ///
    /// Locked tokens are never buyable. Tokens with an unknown age pass the age check;
    /// the check only applies when both block numbers are present.
    pub fn is_buyable(&self, min_age_blocks: u64) -> bool {
        if self.is_locked {
            return false;
        }
        match self.age_blocks() {
            Some(age) => age >= min_age_blocks,
            None => true,
        }
    }

    pub fn volume_24h_f64(&self) -> f64 {
        decimal_to_f64(self.volume_24h)
    }
}

pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(created: Option<u64>, latest: Option<u64>, locked: bool) -> MarketSnapshot {
        MarketSnapshot::new(
            "0xtoken",
            MarketData {
                symbol: "TKN".into(),
                price_usd: dec!(0.01),
                volume_24h: dec!(1000),
                holders: 10,
                market_cap: dec!(10000),
                liquidity: dec!(5000),
                created_at_block: created,
            },
            CurveState {
                progress_bps: 12_000,
                is_graduated: false,
                is_locked: locked,
            },
        )
        .with_latest_block(latest)
    }

    #[test]
    fn young_tokens_are_not_buyable() {
        assert!(!snapshot(Some(100), Some(120), false).is_buyable(50));
        assert!(snapshot(Some(100), Some(150), false).is_buyable(50));
        assert!(snapshot(None, Some(150), false).is_buyable(50));
    }

    #[test]
    fn locked_tokens_are_never_buyable() {
        assert!(!snapshot(Some(1), Some(10_000), true).is_buyable(0));
    }

    #[test]
    fn curve_progress_is_capped() {
        assert_eq!(
            snapshot(None, None, false).bonding_curve_progress,
            CURVE_PROGRESS_MAX_BPS
        );
    }
}
