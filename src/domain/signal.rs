use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::agent::StrategyKind;

/// Maximum confidence a signal can carry
pub const MAX_CONFIDENCE: u8 = 100;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, TradeAction::Buy)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp any confidence estimate into the 0-100 integer range
pub fn clamp_confidence(raw: f64) -> u8 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    raw.round().min(f64::from(MAX_CONFIDENCE)) as u8
}

/// Typed per-strategy diagnostics attached to a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDiagnostics {
    Momentum {
        score: f64,
        short_change_pct: f64,
        medium_change_pct: f64,
        long_change_pct: Option<f64>,
        curve_progress_bps: u32,
        take_profit: bool,
    },
    Yield {
        medium_change_pct: f64,
        short_change_pct: f64,
    },
    Arbitrage {
        short_change_pct: f64,
        scaled_medium_pct: f64,
        spread: f64,
        threshold: f64,
    },
    Dca {
        discount_pct: f64,
        candidates: usize,
    },
    Grid {
        medium_change_pct: f64,
        short_change_pct: f64,
        band_pct: f64,
    },
    Hedge {
        avg_short_change_pct: f64,
        avg_long_change_pct: f64,
        rotation: HedgeRotation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeRotation {
    IntoStable,
    ReEntry,
}

/// Record of an oracle confidence adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementRecord {
    pub provider: String,
    pub original_confidence: u8,
    pub adjusted_confidence: u8,
}

/// Unit of trading intent produced by exactly one strategy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: TradeAction,
    pub token_address: String,
    pub token_symbol: String,
    /// Native units for buys, token units for sells
    pub amount: Decimal,
    confidence: u8,
    pub reason: String,
    pub strategy: StrategyKind,
    pub diagnostics: SignalDiagnostics,
    #[serde(default)]
    pub enhancement: Option<EnhancementRecord>,
}

impl TradeSignal {
    pub fn new(
        action: TradeAction,
        token_address: impl Into<String>,
        token_symbol: impl Into<String>,
        amount: Decimal,
        confidence: f64,
        reason: impl Into<String>,
        strategy: StrategyKind,
        diagnostics: SignalDiagnostics,
    ) -> Self {
        Self {
            action,
            token_address: token_address.into(),
            token_symbol: token_symbol.into(),
            amount,
            confidence: clamp_confidence(confidence),
            reason: reason.into(),
            strategy,
            diagnostics,
            enhancement: None,
        }
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    /// Replace confidence with an externally adjusted value (clamped)
    pub fn apply_enhancement(&mut self, provider: impl Into<String>, adjusted: f64) {
        let adjusted = clamp_confidence(adjusted);
        self.enhancement = Some(EnhancementRecord {
            provider: provider.into(),
            original_confidence: self.confidence,
            adjusted_confidence: adjusted,
        });
        self.confidence = adjusted;
    }
}
