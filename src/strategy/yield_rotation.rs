//! Yield rotation across allow-listed yield-bearing assets
//!
//! Buys dips in staked/yield assets and rotates out after a spike once short-term
//! momentum fades.

use rust_decimal::Decimal;

use crate::domain::{MarketSnapshot, SignalDiagnostics, StrategyKind, TradeAction, TradeSignal};

use super::sizing::buy_size;
use super::{best, is_decelerating, Candidate, EvalContext};

const DIP_THRESHOLD_PCT: f64 = -3.0;
const SPIKE_THRESHOLD_PCT: f64 = 5.0;

pub fn evaluate(ctx: &EvalContext<'_>, markets: &[&MarketSnapshot]) -> Option<TradeSignal> {
    let mut candidates = Vec::new();

    let eligible = markets.iter().filter(|m| {
        ctx.settings
            .yield_assets
            .iter()
            .any(|asset| asset.matches(&m.token_address, &m.symbol))
    });

    for market in eligible {
        let (Some(short), Some(medium)) = (market.short(), market.medium()) else {
            continue;
        };
        let medium_pct = medium.price_change_pct;
        let diagnostics = SignalDiagnostics::Yield {
            medium_change_pct: medium_pct,
            short_change_pct: short.price_change_pct,
        };

        if medium_pct <= DIP_THRESHOLD_PCT {
            if !market.is_buyable(ctx.settings.min_token_age_blocks) {
                continue;
            }
            let dip = -medium_pct;
            let confidence = (60.0 + 5.0 * dip).min(85.0);
            candidates.push(Candidate {
                rank: confidence,
                signal: TradeSignal::new(
                    TradeAction::Buy,
                    &market.token_address,
                    &market.symbol,
                    buy_size(ctx.agent, ctx.params, Decimal::ONE),
                    confidence,
                    format!("{} dipped {:.2}% over 1h", market.symbol, medium_pct),
                    StrategyKind::Yield,
                    diagnostics,
                ),
            });
        } else if medium_pct > SPIKE_THRESHOLD_PCT && is_decelerating(short.price_change_pct, medium_pct) {
            let held = ctx.held(&market.token_address);
            if held <= Decimal::ZERO {
                continue;
            }
            let confidence = (55.0 + 5.0 * (medium_pct - SPIKE_THRESHOLD_PCT)).min(80.0);
            candidates.push(Candidate {
                rank: confidence,
                signal: TradeSignal::new(
                    TradeAction::Sell,
                    &market.token_address,
                    &market.symbol,
                    held,
                    confidence,
                    format!(
                        "{} up {:.2}% over 1h with fading 5m momentum ({:.2}%)",
                        market.symbol, medium_pct, short.price_change_pct
                    ),
                    StrategyKind::Yield,
                    diagnostics,
                ),
            });
        }
    }

    best(candidates)
}
