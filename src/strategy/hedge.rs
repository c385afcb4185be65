//! Portfolio hedge
//!
//! Computes a capital-weighted average of short and long price changes over the
//! non-stable universe. A broad downtrend rotates into the configured stablecoin; a
//! broad uptrend re-enters the strongest non-stable token.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::market::decimal_to_f64;
use crate::domain::{
    HedgeRotation, MarketSnapshot, SignalDiagnostics, StrategyKind, TradeAction, TradeSignal,
};

use super::sizing::buy_size;
use super::EvalContext;

const STABLE_SIZE_MULTIPLIER: Decimal = dec!(1.5);

const BEAR_LONG_AVG_PCT: f64 = -5.0;
const BEAR_SHORT_AVG_PCT: f64 = -1.0;
const BULL_LONG_AVG_PCT: f64 = 3.0;
const BULL_SHORT_AVG_PCT: f64 = 0.5;

/// Weighted (short, long) averages; `None` when nothing carries weight
pub fn weighted_trend(ctx: &EvalContext<'_>, markets: &[&MarketSnapshot]) -> Option<(f64, f64)> {
    let mut weight_sum = 0.0;
    let mut short_sum = 0.0;
    let mut long_sum = 0.0;

    for market in markets {
        if ctx.settings.is_stable(&market.token_address, &market.symbol) {
            continue;
        }
        let (Some(short), Some(long)) = (market.short(), market.long()) else {
            continue;
        };
        let weight = match ctx.agent.holding(&market.token_address) {
            Some(holding) if holding.value_usd > Decimal::ZERO => decimal_to_f64(holding.value_usd),
            _ => decimal_to_f64(market.market_cap),
        };
        if weight <= 0.0 {
            continue;
        }
        weight_sum += weight;
        short_sum += weight * short.price_change_pct;
        long_sum += weight * long.price_change_pct;
    }

    if weight_sum <= 0.0 {
        return None;
    }
    Some((short_sum / weight_sum, long_sum / weight_sum))
}

pub fn evaluate(ctx: &EvalContext<'_>, markets: &[&MarketSnapshot]) -> Option<TradeSignal> {
    let (avg_short, avg_long) = weighted_trend(ctx, markets)?;
    let confidence = (60.0 + 3.0 * avg_long.abs()).min(90.0);

    if avg_long < BEAR_LONG_AVG_PCT && avg_short < BEAR_SHORT_AVG_PCT {
        let stable = &ctx.settings.stablecoin;
        return Some(TradeSignal::new(
            TradeAction::Buy,
            &stable.address,
            &stable.symbol,
            buy_size(ctx.agent, ctx.params, STABLE_SIZE_MULTIPLIER),
            confidence,
            format!(
                "portfolio trend {:.2}% (4h) / {:.2}% (5m), rotating into {}",
                avg_long, avg_short, stable.symbol
            ),
            StrategyKind::Hedge,
            SignalDiagnostics::Hedge {
                avg_short_change_pct: avg_short,
                avg_long_change_pct: avg_long,
                rotation: HedgeRotation::IntoStable,
            },
        ));
    }

    if avg_long > BULL_LONG_AVG_PCT && avg_short > BULL_SHORT_AVG_PCT {
        let leader = markets
            .iter()
            .filter(|m| !ctx.settings.is_stable(&m.token_address, &m.symbol))
            .filter(|m| m.is_buyable(ctx.settings.min_token_age_blocks))
            .filter_map(|m| m.long().map(|long| (*m, long.price_change_pct)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(m, _)| m)?;

        return Some(TradeSignal::new(
            TradeAction::Buy,
            &leader.token_address,
            &leader.symbol,
            buy_size(ctx.agent, ctx.params, Decimal::ONE),
            confidence,
            format!(
                "portfolio trend {:.2}% (4h) / {:.2}% (5m), re-entering {}",
                avg_long, avg_short, leader.symbol
            ),
            StrategyKind::Hedge,
            SignalDiagnostics::Hedge {
                avg_short_change_pct: avg_short,
                avg_long_change_pct: avg_long,
                rotation: HedgeRotation::ReEntry,
            },
        ));
    }

    None
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
    fn broad_downtrend_rotates_into_stablecoin() {
        let agent = agent(StrategyKind::Hedge, RiskLevel::Medium);
        let markets = vec![
            snapshot("0xa", Some(tf(-2.0, 0.0, 10)), None, Some(tf(-8.0, 0.0, 10))),
            snapshot("0xb", Some(tf(-1.5, 0.0, 10)), None, Some(tf(-6.0, 0.0, 10))),
        ];
        let signal = run(&agent, &markets).expect("hedge into stable");
        assert_eq!(signal.token_symbol, "USDC");
        assert_eq!(signal.amount, dec!(150));
        // equal market caps: long avg -7 => 60 + 21
        assert_eq!(signal.confidence(), 81);
    }

    #[test]
    fn uptrend_re_enters_the_strongest_token() {
        let agent = agent(StrategyKind::Hedge, RiskLevel::Medium);
        let markets = vec![
            snapshot("0xa", Some(tf(1.0, 0.0, 10)), None, Some(tf(4.0, 0.0, 10))),
            snapshot("0xb", Some(tf(1.0, 0.0, 10)), None, Some(tf(6.0, 0.0, 10))),
        ];
        let signal = run(&agent, &markets).expect("re-entry");
        assert_eq!(signal.token_address, "0xb");
        assert_eq!(signal.amount, dec!(100));
    }

    #[test]
    fn holdings_outweigh_market_cap() {
        let mut agent = agent(StrategyKind::Hedge, RiskLevel::Medium);
        hold(&mut agent, "0xa", dec!(1000000));
        let markets = vec![
            snapshot("0xa", Some(tf(-3.0, 0.0, 10)), None, Some(tf(-10.0, 0.0, 10))),
            snapshot("0xb", Some(tf(2.0, 0.0, 10)), None, Some(tf(5.0, 0.0, 10))),
        ];
        let settings = StrategySettings::default();
        let ctx = EvalContext {
            agent: &agent,
            params: RiskParameters::for_level(agent.risk_level),
            settings: &settings,
        };
        let refs: Vec<&MarketSnapshot> = markets.iter().collect();
        let (_, long) = weighted_trend(&ctx, &refs).unwrap();
        assert!(long < -8.0);
    }

    #[test]
    fn stable_tokens_do_not_count_toward_the_trend() {
        let agent = agent(StrategyKind::Hedge, RiskLevel::Medium);
        let mut usdt = snapshot("0xusdt", Some(tf(-5.0, 0.0, 10)), None, Some(tf(-20.0, 0.0, 10)));
        usdt.symbol = "USDT".into();
        assert!(run(&agent, &[usdt]).is_none());
    }

    #[test]
    fn mixed_trend_does_nothing() {
        let agent = agent(StrategyKind::Hedge, RiskLevel::Medium);
        let markets = vec![snapshot("0xa", Some(tf(0.2, 0.0, 10)), None, Some(tf(-6.0, 0.0, 10)))];
        assert!(run(&agent, &markets).is_none());
    }
}
