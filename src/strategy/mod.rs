//! Strategy evaluators
//!
//! Six pure evaluators, one per [`StrategyKind`]. Each scans the cycle's snapshots
//! plus the agent's holdings and returns at most one signal: its best candidate.
//! [`StrategyEngine`] runs the one strategy the agent is configured for and applies
//! the checks every strategy shares (locked tokens, tier confidence floor, sell
//! amounts bounded by holdings).

pub mod arbitrage;
pub mod dca;
pub mod grid;
pub mod hedge;
pub mod momentum;
pub mod risk_table;
pub mod settings;
pub mod sizing;
pub mod yield_rotation;

use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{AgentContext, MarketSnapshot, StrategyKind, TradeSignal};

pub use risk_table::RiskParameters;
pub use settings::{AssetRef, StrategySettings};
pub use sizing::{safe_size, GAS_RESERVE};

/// Inputs shared by every evaluator for one cycle
pub struct EvalContext<'a> {
    pub agent: &'a AgentContext,
    pub params: &'static RiskParameters,
    pub settings: &'a StrategySettings,
}

impl EvalContext<'_> {
    pub fn held(&self, token_address: &str) -> Decimal {
        self.agent.held_balance(token_address)
    }
}

/// A scored candidate; evaluators keep the highest rank
pub(crate) struct Candidate {
    pub rank: f64,
    pub signal: TradeSignal,
}

pub(crate) fn best(candidates: impl IntoIterator<Item = Candidate>) -> Option<TradeSignal> {
    candidates
        .into_iter()
        .max_by(|a, b| a.rank.total_cmp(&b.rank))
        .map(|c| c.signal)
}

/// Short-term pace below the medium-timeframe average pace
pub(crate) fn is_decelerating(short_change_pct: f64, medium_change_pct: f64) -> bool {
    short_change_pct < medium_change_pct / 12.0
}

/// Dispatches an agent to its configured strategy
#[derive(Debug, Clone, Default)]
pub struct StrategyEngine {
    settings: StrategySettings,
}

impl StrategyEngine {
    pub fn new(settings: StrategySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StrategySettings {
        &self.settings
    }

    pub fn evaluate(&self, agent: &AgentContext, markets: &[MarketSnapshot]) -> Option<TradeSignal> {
        let params = RiskParameters::for_level(agent.risk_level);
        let unlocked: Vec<&MarketSnapshot> = markets.iter().filter(|m| !m.is_locked).collect();
        let ctx = EvalContext {
            agent,
            params,
            settings: &self.settings,
        };

        let mut signal = match agent.strategy {
            StrategyKind::Momentum => momentum::evaluate(&ctx, &unlocked),
            StrategyKind::Yield => yield_rotation::evaluate(&ctx, &unlocked),
            StrategyKind::Arbitrage => arbitrage::evaluate(&ctx, &unlocked),
            StrategyKind::Dca => dca::evaluate(&ctx, &unlocked),
            StrategyKind::Grid => grid::evaluate(&ctx, &unlocked),
            StrategyKind::Hedge => hedge::evaluate(&ctx, &unlocked),
        }?;

        let locked = markets
            .iter()
            .any(|m| m.is_locked && m.token_address.eq_ignore_ascii_case(&signal.token_address));
        if locked {
            debug!(agent = %agent.id, token = %signal.token_symbol, "dropping signal on locked token");
            return None;
        }

        if signal.confidence() < params.min_confidence {
            debug!(
                agent = %agent.id,
                strategy = %agent.strategy,
                confidence = signal.confidence(),
                min = params.min_confidence,
                "signal below tier confidence floor"
            );
            return None;
        }

        if !signal.action.is_buy() {
            let held = agent.held_balance(&signal.token_address);
            signal.amount = signal.amount.min(held);
            if signal.amount <= Decimal::ZERO {
                return None;
            }
        }

        debug!(
            agent = %agent.id,
            strategy = %agent.strategy,
            action = %signal.action,
            token = %signal.token_symbol,
            amount = %signal.amount,
            confidence = signal.confidence(),
            "strategy produced signal"
        );
        Some(signal)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::domain::{RiskLevel, TradeAction};

    #[test]
    fn locked_token_is_never_selected_even_with_best_score() {
        let agent = agent(StrategyKind::Momentum, RiskLevel::High);
        let mut hot = snapshot("0xhot", Some(tf(30.0, 50.0, 500)), Some(tf(25.0, 0.0, 900)), None);
        hot.is_locked = true;
        let mild = snapshot("0xmild", Some(tf(6.0, 0.0, 50)), Some(tf(4.0, 0.0, 90)), None);

        let engine = StrategyEngine::default();
        let signal = engine.evaluate(&agent, &[hot, mild]).expect("mild token should signal");
        assert_eq!(signal.token_address, "0xmild");
    }

    #[test]
    fn every_tier_enforces_its_confidence_floor() {
        let engine = StrategyEngine::default();
        let markets = vec![snapshot("0xa", Some(tf(6.0, 0.0, 50)), Some(tf(4.0, 0.0, 90)), None)];
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            let agent = agent(StrategyKind::Momentum, level);
            if let Some(signal) = engine.evaluate(&agent, &markets) {
                assert!(signal.confidence() >= RiskParameters::for_level(level).min_confidence);
            }
        }
        let medium = agent(StrategyKind::Momentum, RiskLevel::Medium);
        assert!(engine.evaluate(&medium, &markets).is_some());

        let weak = vec![snapshot("0xb", Some(tf(4.0, 0.0, 50)), Some(tf(2.0, 0.0, 90)), None)];
        let low = agent(StrategyKind::Momentum, RiskLevel::Low);
        assert!(engine.evaluate(&low, &weak).is_none());
    }

    #[test]
    fn sells_never_exceed_holdings() {
        let mut agent = agent(StrategyKind::Momentum, RiskLevel::High);
        hold(&mut agent, "0xdump", dec_amount());
        let markets = vec![snapshot(
            "0xdump",
            Some(tf(-9.0, 10.0, 80)),
            Some(tf(-6.0, 0.0, 100)),
            Some(tf(-4.0, 0.0, 200)),
        )];
        let signal = StrategyEngine::default()
            .evaluate(&agent, &markets)
            .expect("sell signal");
        assert_eq!(signal.action, TradeAction::Sell);
        assert!(signal.amount <= agent.held_balance("0xdump"));
    }

    fn dec_amount() -> Decimal {
        Decimal::new(1234, 1)
    }
}
