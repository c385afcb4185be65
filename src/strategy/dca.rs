//! Dollar-cost averaging into allow-listed majors
//!
//! Always buys, at half the tier size, whichever configured asset currently trades
//! at the deepest discount.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{MarketSnapshot, SignalDiagnostics, StrategyKind, TradeAction, TradeSignal};

use super::sizing::buy_size;
use super::EvalContext;

const SIZE_MULTIPLIER: Decimal = dec!(0.5);

pub fn discount(medium_change_pct: f64) -> f64 {
    (-medium_change_pct / 2.0).max(0.0)
}

pub fn evaluate(ctx: &EvalContext<'_>, markets: &[&MarketSnapshot]) -> Option<TradeSignal> {
    let candidates: Vec<(&MarketSnapshot, f64)> = markets
        .iter()
        .filter(|m| {
            ctx.settings
                .dca_assets
                .iter()
                .any(|asset| asset.matches(&m.token_address, &m.symbol))
        })
        .filter(|m| m.is_buyable(ctx.settings.min_token_age_blocks))
        .filter_map(|m| m.medium().map(|medium| (*m, discount(medium.price_change_pct))))
        .collect();

    let (market, discount) = candidates
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .copied()?;

    let confidence = 65.0 + (2.0 * discount).min(20.0);
    Some(TradeSignal::new(
        TradeAction::Buy,
        &market.token_address,
        &market.symbol,
        buy_size(ctx.agent, ctx.params, SIZE_MULTIPLIER),
        confidence,
        format!("scheduled accumulation of {} at {:.2}% discount", market.symbol, discount),
        StrategyKind::Dca,
        SignalDiagnostics::Dca {
            discount_pct: discount,
            candidates: candidates.len(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentContext, RiskLevel};
    use crate::strategy::test_support::*;
    use crate::strategy::{RiskParameters, StrategySettings};

    const WMON: &str = "0x760afe86e5de5fa0ee542fc7b7b713e1c5425701";
    const WETH: &str = "0xb5a30b0fdc5ea94a52fdc42e3e9760cb8449fb37";

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
    fn buys_the_deepest_discount_at_half_size() {
        let agent = agent(StrategyKind::Dca, RiskLevel::Medium);
        let markets = vec![
            snapshot(WMON, None, Some(tf(-2.0, 0.0, 10)), None),
            snapshot(WETH, None, Some(tf(-6.0, 0.0, 10)), None),
        ];
        let signal = run(&agent, &markets).expect("dca always buys");
        assert_eq!(signal.token_address, WETH);
        assert_eq!(signal.action, TradeAction::Buy);
        assert_eq!(signal.amount, dec!(50));
        assert_eq!(signal.confidence(), 71);
    }

    #[test]
    fn rising_assets_get_base_confidence() {
        let agent = agent(StrategyKind::Dca, RiskLevel::Medium);
        let markets = vec![snapshot(WMON, None, Some(tf(8.0, 0.0, 10)), None)];
        assert_eq!(run(&agent, &markets).unwrap().confidence(), 65);
    }

    #[test]
    fn discount_bonus_caps_at_twenty() {
        assert_eq!(discount(-60.0), 30.0);
        let agent = agent(StrategyKind::Dca, RiskLevel::Medium);
        let markets = vec![snapshot(WMON, None, Some(tf(-60.0, 0.0, 10)), None)];
        assert_eq!(run(&agent, &markets).unwrap().confidence(), 85);
    }

    #[test]
    fn nothing_to_buy_without_allow_listed_data() {
        let agent = agent(StrategyKind::Dca, RiskLevel::Medium);
        let markets = vec![
            snapshot("0xother", None, Some(tf(-10.0, 0.0, 10)), None),
            snapshot(WMON, Some(tf(1.0, 0.0, 10)), None, None),
        ];
        assert!(run(&agent, &markets).is_none());
    }
}
