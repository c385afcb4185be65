//! Short-vs-medium timeframe spread strategy
//!
//! The 1h change is rescaled to a 5m pace (divided by 12) and compared against the
//! actual 5m change. A spread beyond the tier threshold is traded in its direction.

use rust_decimal::Decimal;

use crate::domain::{MarketSnapshot, SignalDiagnostics, StrategyKind, TradeAction, TradeSignal};

use super::sizing::buy_size;
use super::{best, Candidate, EvalContext};

/// 5m intervals per 1h
const MEDIUM_TO_SHORT_DIVISOR: f64 = 12.0;

pub fn spread(short_change_pct: f64, medium_change_pct: f64) -> f64 {
    short_change_pct - medium_change_pct / MEDIUM_TO_SHORT_DIVISOR
}

pub fn evaluate(ctx: &EvalContext<'_>, markets: &[&MarketSnapshot]) -> Option<TradeSignal> {
    let threshold = ctx.params.arbitrage_spread_threshold;
    let mut candidates = Vec::new();

    for market in markets {
        let (Some(short), Some(medium)) = (market.short(), market.medium()) else {
            continue;
        };
        let spread = spread(short.price_change_pct, medium.price_change_pct);
        if spread.abs() <= threshold {
            continue;
        }

        let (action, amount) = if spread > 0.0 {
            if !market.is_buyable(ctx.settings.min_token_age_blocks) {
                continue;
            }
            (TradeAction::Buy, buy_size(ctx.agent, ctx.params, Decimal::ONE))
        } else {
            let held = ctx.held(&market.token_address);
            if held <= Decimal::ZERO {
                continue;
            }
            (TradeAction::Sell, held)
        };

        let confidence = (55.0 + 5.0 * spread.abs()).min(90.0);
        candidates.push(Candidate {
            rank: spread.abs(),
            signal: TradeSignal::new(
                action,
                &market.token_address,
                &market.symbol,
                amount,
                confidence,
                format!(
                    "{} spread {:+.2} beyond {:.1} threshold",
                    market.symbol, spread, threshold
                ),
                StrategyKind::Arbitrage,
                SignalDiagnostics::Arbitrage {
                    short_change_pct: short.price_change_pct,
                    scaled_medium_pct: medium.price_change_pct / MEDIUM_TO_SHORT_DIVISOR,
                    spread,
                    threshold,
                },
            ),
        });
    }

    best(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentContext, RiskLevel};
    use crate::strategy::test_support::*;
    use crate::strategy::{RiskParameters, StrategySettings};
    use rust_decimal_macros::dec;

    fn run(agent: &AgentContext, markets: &[MarketSnapshot]) -> Option<TradeSignal> {
        let settings = StrategySettings::default();
        let ctx = EvalContext {
            agent,
            params: RiskParameters::for_level(agent.risk_level),
            settings: &settings,
        };
        let refs: Vec<&MarketSnapshot> = markets.iter().collect();
        evaluate(&ctx, &refs)
    }

    #[test]
    fn spread_rescales_the_medium_timeframe() {
        assert!((spread(3.0, 12.0) - 2.0).abs() < 1e-12);
        assert!((spread(-1.0, 24.0) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn threshold_depends_on_tier() {
        // spread = 2.5 - 6/12 = 2.0
        let markets = vec![snapshot("0xa", Some(tf(2.5, 0.0, 10)), Some(tf(6.0, 0.0, 10)), None)];
        let low = agent(StrategyKind::Arbitrage, RiskLevel::Low);
        let high = agent(StrategyKind::Arbitrage, RiskLevel::High);

        let signal = run(&low, &markets).expect("low tier threshold 1.5");
        assert_eq!(signal.action, TradeAction::Buy);
        assert_eq!(signal.confidence(), 65);
        assert!(run(&high, &markets).is_none());
    }

    #[test]
    fn negative_spread_sells_held_balance() {
        let mut agent = agent(StrategyKind::Arbitrage, RiskLevel::Medium);
        let markets = vec![snapshot("0xa", Some(tf(-4.0, 0.0, 10)), Some(tf(0.0, 0.0, 10)), None)];
        assert!(run(&agent, &markets).is_none());

        hold(&mut agent, "0xa", dec!(7));
        let signal = run(&agent, &markets).expect("sell");
        assert_eq!(signal.action, TradeAction::Sell);
        assert_eq!(signal.amount, dec!(7));
        assert_eq!(signal.confidence(), 75);
    }

    #[test]
    fn picks_the_widest_spread() {
        let agent = agent(StrategyKind::Arbitrage, RiskLevel::Low);
        let markets = vec![
            snapshot("0xa", Some(tf(2.0, 0.0, 10)), Some(tf(0.0, 0.0, 10)), None),
            snapshot("0xb", Some(tf(9.0, 0.0, 10)), Some(tf(0.0, 0.0, 10)), None),
        ];
        let signal = run(&agent, &markets).unwrap();
        assert_eq!(signal.token_address, "0xb");
        assert_eq!(signal.confidence(), 90);
    }
}
