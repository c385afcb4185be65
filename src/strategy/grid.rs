//! Mean-reversion grid on liquid tokens

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{MarketSnapshot, SignalDiagnostics, StrategyKind, TradeAction, TradeSignal};

use super::sizing::buy_size;
use super::{best, is_decelerating, Candidate, EvalContext};

const MIN_VOLUME_USD: Decimal = dec!(10000);
const BAND_PCT: f64 = 3.0;
const STABILIZING_PCT: f64 = 0.5;

pub fn evaluate(ctx: &EvalContext<'_>, markets: &[&MarketSnapshot]) -> Option<TradeSignal> {
    let mut candidates = Vec::new();

    for market in markets.iter().filter(|m| m.volume_24h >= MIN_VOLUME_USD) {
        let (Some(short), Some(medium)) = (market.short(), market.medium()) else {
            continue;
        };
        let medium_pct = medium.price_change_pct;
        let short_pct = short.price_change_pct;

        let (action, amount, reason) = if medium_pct <= -BAND_PCT && short_pct.abs() <= STABILIZING_PCT {
            if !market.is_buyable(ctx.settings.min_token_age_blocks) {
                continue;
            }
            (
                TradeAction::Buy,
                buy_size(ctx.agent, ctx.params, Decimal::ONE),
                format!("{} stabilizing after {:.2}% drop", market.symbol, medium_pct),
            )
        } else if medium_pct >= BAND_PCT && is_decelerating(short_pct, medium_pct) {
            let held = ctx.held(&market.token_address);
            if held <= Decimal::ZERO {
                continue;
            }
            (
                TradeAction::Sell,
                held,
                format!("{} fading after {:.2}% rise", market.symbol, medium_pct),
            )
        } else {
            continue;
        };

        let confidence = (55.0 + 3.0 * medium_pct.abs()).min(85.0);
        candidates.push(Candidate {
            rank: confidence,
            signal: TradeSignal::new(
                action,
                &market.token_address,
                &market.symbol,
                amount,
                confidence,
                reason,
                StrategyKind::Grid,
                SignalDiagnostics::Grid {
                    medium_change_pct: medium_pct,
                    short_change_pct: short_pct,
                    band_pct: BAND_PCT,
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
    fn buys_a_stabilized_drop() {
        let agent = agent(StrategyKind::Grid, RiskLevel::Medium);
        let markets = vec![snapshot("0xa", Some(tf(0.3, 0.0, 10)), Some(tf(-5.0, 0.0, 10)), None)];
        let signal = run(&agent, &markets).expect("grid buy");
        assert_eq!(signal.action, TradeAction::Buy);
        assert_eq!(signal.confidence(), 70);
    }

    #[test]
    fn still_falling_is_not_a_buy() {
        let agent = agent(StrategyKind::Grid, RiskLevel::Medium);
        let markets = vec![snapshot("0xa", Some(tf(-1.5, 0.0, 10)), Some(tf(-5.0, 0.0, 10)), None)];
        assert!(run(&agent, &markets).is_none());
    }

    #[test]
    fn sells_a_fading_rise_from_holdings() {
        let mut agent = agent(StrategyKind::Grid, RiskLevel::Medium);
        hold(&mut agent, "0xa", dec!(12));
        let markets = vec![snapshot("0xa", Some(tf(0.1, 0.0, 10)), Some(tf(4.0, 0.0, 10)), None)];
        let signal = run(&agent, &markets).expect("grid sell");
        assert_eq!(signal.action, TradeAction::Sell);
        assert_eq!(signal.amount, dec!(12));
        assert_eq!(signal.confidence(), 67);
    }

    #[test]
    fn illiquid_tokens_are_skipped() {
        let agent = agent(StrategyKind::Grid, RiskLevel::Medium);
        let mut market = snapshot("0xa", Some(tf(0.3, 0.0, 10)), Some(tf(-5.0, 0.0, 10)), None);
        market.volume_24h = dec!(9999);
        assert!(run(&agent, &[market]).is_none());
    }

    #[test]
    fn confidence_caps_at_85() {
        let agent = agent(StrategyKind::Grid, RiskLevel::Medium);
        let markets = vec![snapshot("0xa", Some(tf(0.0, 0.0, 10)), Some(tf(-30.0, 0.0, 10)), None)];
        assert_eq!(run(&agent, &markets).unwrap().confidence(), 85);
    }
}
