//! Momentum strategy
//!
//! Weighted multi-timeframe price change, scaled by short-term volume direction and
//! boosted by curve progress, 24h volume, holder count and long-timeframe agreement.
//! Tokens close to graduation with a held balance are sold outright.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{MarketSnapshot, SignalDiagnostics, StrategyKind, TradeAction, TradeSignal};

use super::sizing::buy_size;
use super::{best, Candidate, EvalContext};

const MIN_LIQUIDITY_USD: Decimal = dec!(1000);
const MIN_MARKET_CAP_USD: Decimal = dec!(5000);
const MIN_SCORE: f64 = 3.0;
const MIN_SHORT_TX_COUNT: u64 = 10;
const MAX_CONFIDENCE: f64 = 95.0;

const TAKE_PROFIT_PROGRESS_BPS: u32 = 8500;
const TAKE_PROFIT_CONFIDENCE: f64 = 90.0;

const SWEET_SPOT_PROGRESS_BPS: (u32, u32) = (5000, 7000);
const HIGH_VOLUME_USD: f64 = 50_000.0;
const HOLDER_THRESHOLD: u64 = 50;

/// Momentum score for one snapshot, `None` when short or medium data is missing
pub fn momentum_score(market: &MarketSnapshot) -> Option<f64> {
    let short = market.short()?;
    let medium = market.medium()?;
    let long = market.long();

    let mut score = match long {
        Some(long) => {
            0.30 * short.price_change_pct + 0.40 * medium.price_change_pct + 0.30 * long.price_change_pct
        }
        None => 0.45 * short.price_change_pct + 0.55 * medium.price_change_pct,
    };

    if short.volume_change_pct > 0.0 {
        score *= 1.2;
    } else if short.volume_change_pct < 0.0 {
        score *= 0.8;
    }

    let progress = market.bonding_curve_progress;
    if (SWEET_SPOT_PROGRESS_BPS.0..=SWEET_SPOT_PROGRESS_BPS.1).contains(&progress) {
        score *= 1.10;
    }
    if market.volume_24h_f64() >= HIGH_VOLUME_USD {
        score *= 1.15;
    }
    if market.holders > HOLDER_THRESHOLD {
        score *= 1.10;
    }
    if let Some(long) = long {
        let agrees = (score > 0.0 && long.price_change_pct > 0.0)
            || (score < 0.0 && long.price_change_pct < 0.0);
        if agrees {
            score *= 1.08;
        }
    }

    Some(score)
}

pub fn confidence_for(score: f64) -> f64 {
    (50.0 + 5.0 * score.abs()).min(MAX_CONFIDENCE)
}

pub fn evaluate(ctx: &EvalContext<'_>, markets: &[&MarketSnapshot]) -> Option<TradeSignal> {
    let mut candidates = Vec::new();

    for market in markets {
        let held = ctx.held(&market.token_address);

        if market.bonding_curve_progress > TAKE_PROFIT_PROGRESS_BPS && held > Decimal::ZERO {
            candidates.push(Candidate {
                rank: f64::INFINITY,
                signal: TradeSignal::new(
                    TradeAction::Sell,
                    &market.token_address,
                    &market.symbol,
                    held,
                    TAKE_PROFIT_CONFIDENCE,
                    format!(
                        "take profit: curve at {} bps, close to graduation",
                        market.bonding_curve_progress
                    ),
                    StrategyKind::Momentum,
                    diagnostics(market, 0.0, true),
                ),
            });
            continue;
        }

        if market.liquidity < MIN_LIQUIDITY_USD || market.market_cap < MIN_MARKET_CAP_USD {
            continue;
        }
        let Some(short) = market.short() else {
            continue;
        };
        if short.tx_count < MIN_SHORT_TX_COUNT {
            continue;
        }
        let Some(score) = momentum_score(market) else {
            continue;
        };
        if score.abs() < MIN_SCORE {
            continue;
        }

        let confidence = confidence_for(score);
        if confidence < f64::from(ctx.params.min_confidence) {
            continue;
        }

        let (action, amount) = if score > 0.0 {
            if !market.is_buyable(ctx.settings.min_token_age_blocks) {
                continue;
            }
            (TradeAction::Buy, buy_size(ctx.agent, ctx.params, Decimal::ONE))
        } else {
            if held <= Decimal::ZERO {
                continue;
            }
            (TradeAction::Sell, held)
        };

        candidates.push(Candidate {
            rank: score.abs(),
            signal: TradeSignal::new(
                action,
                &market.token_address,
                &market.symbol,
                amount,
                confidence,
                format!("momentum score {:.2} on {}", score, market.symbol),
                StrategyKind::Momentum,
                diagnostics(market, score, false),
            ),
        });
    }

    best(candidates)
}

fn diagnostics(market: &MarketSnapshot, score: f64, take_profit: bool) -> SignalDiagnostics {
    SignalDiagnostics::Momentum {
        score,
        short_change_pct: market.short().map(|m| m.price_change_pct).unwrap_or_default(),
        medium_change_pct: market.medium().map(|m| m.price_change_pct).unwrap_or_default(),
        long_change_pct: market.long().map(|m| m.price_change_pct),
        curve_progress_bps: market.bonding_curve_progress,
        take_profit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;
    use crate::strategy::test_support::*;
    use crate::strategy::{RiskParameters, StrategySettings};

    fn run(agent: &crate::domain::AgentContext, markets: &[MarketSnapshot]) -> Option<TradeSignal> {
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
    fn two_timeframe_score_uses_short_medium_weights() {
        let market = snapshot("0xa", Some(tf(6.0, 0.0, 50)), Some(tf(4.0, 0.0, 90)), None);
        let score = momentum_score(&market).unwrap();
        assert!((score - 4.9).abs() < 1e-9);

        let agent = agent(StrategyKind::Momentum, RiskLevel::High);
        let signal = run(&agent, &[market]).expect("buy candidate");
        assert_eq!(signal.action, TradeAction::Buy);
        assert_eq!(signal.amount, dec!(200));
    }

    #[test]
    fn volume_direction_scales_the_score() {
        let rising = snapshot("0xa", Some(tf(6.0, 5.0, 50)), Some(tf(4.0, 0.0, 90)), None);
        let falling = snapshot("0xa", Some(tf(6.0, -5.0, 50)), Some(tf(4.0, 0.0, 90)), None);
        assert!((momentum_score(&rising).unwrap() - 4.9 * 1.2).abs() < 1e-9);
        assert!((momentum_score(&falling).unwrap() - 4.9 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn boosts_compound() {
        let mut market = snapshot(
            "0xa",
            Some(tf(5.0, 0.0, 50)),
            Some(tf(5.0, 0.0, 90)),
            Some(tf(5.0, 0.0, 100)),
        );
        market.bonding_curve_progress = 6000;
        market.volume_24h = dec!(60000);
        market.holders = 51;
        let expected = 5.0 * 1.10 * 1.15 * 1.10 * 1.08;
        assert!((momentum_score(&market).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn thin_or_quiet_tokens_are_skipped() {
        let agent = agent(StrategyKind::Momentum, RiskLevel::High);

        let mut illiquid = snapshot("0xa", Some(tf(10.0, 0.0, 50)), Some(tf(8.0, 0.0, 90)), None);
        illiquid.liquidity = dec!(999);
        assert!(run(&agent, &[illiquid]).is_none());

        let quiet = snapshot("0xb", Some(tf(10.0, 0.0, 9)), Some(tf(8.0, 0.0, 90)), None);
        assert!(run(&agent, &[quiet]).is_none());

        let flat = snapshot("0xc", Some(tf(2.0, 0.0, 50)), Some(tf(2.0, 0.0, 90)), None);
        assert!(run(&agent, &[flat]).is_none());

        let missing = snapshot("0xd", Some(tf(10.0, 0.0, 50)), None, None);
        assert!(run(&agent, &[missing]).is_none());
    }

    #[test]
    fn take_profit_outranks_stronger_candidates() {
        let mut agent = agent(StrategyKind::Momentum, RiskLevel::High);
        hold(&mut agent, "0xgrad", dec!(42));
        let mut graduating = snapshot("0xgrad", None, None, None);
        graduating.bonding_curve_progress = 9000;
        let hot = snapshot("0xhot", Some(tf(30.0, 10.0, 500)), Some(tf(20.0, 0.0, 900)), None);

        let signal = run(&agent, &[hot, graduating]).expect("take profit");
        assert_eq!(signal.action, TradeAction::Sell);
        assert_eq!(signal.token_address, "0xgrad");
        assert_eq!(signal.amount, dec!(42));
        assert_eq!(signal.confidence(), 90);
    }

    #[test]
    fn bearish_score_without_holding_is_ignored() {
        let agent = agent(StrategyKind::Momentum, RiskLevel::High);
        let market = snapshot("0xa", Some(tf(-10.0, 0.0, 50)), Some(tf(-8.0, 0.0, 90)), None);
        assert!(run(&agent, &[market]).is_none());
    }

    #[test]
    fn young_tokens_are_not_bought() {
        let agent = agent(StrategyKind::Momentum, RiskLevel::High);
        let mut market = snapshot("0xa", Some(tf(10.0, 0.0, 50)), Some(tf(8.0, 0.0, 90)), None);
        market.created_at_block = Some(9_990);
        assert!(run(&agent, &[market]).is_none());
    }

    #[test]
    fn confidence_caps_at_95() {
        assert_eq!(confidence_for(100.0), 95.0);
        assert_eq!(confidence_for(-4.0), 70.0);
    }
}
