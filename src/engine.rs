//! Trading cycle pipeline
//!
//! One cycle for one agent runs load → snapshot → evaluate → enhance → risk →
//! execute → settle under that agent's lock, so an agent never has two trades in
//! flight. Different agents run concurrently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{Execution, ExecutionStatus, MarketSnapshot};
use crate::enhancer::EnhancerChain;
use crate::error::Result;
use crate::execution::{ChainClient, ExecutionRouter};
use crate::market::SnapshotBuilder;
use crate::risk::{BlockReason, RiskCheckResult, RiskGuard};
use crate::settlement::{LedgerStore, SettlementService};
use crate::strategy::{RiskParameters, StrategyEngine};

/// How a cycle ended
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// No evaluator proposed a trade
    NoSignal,
    /// Enhancement pushed confidence under the tier floor
    BelowConfidence { confidence: u8, min_confidence: u8 },
    /// Risk guard rejected the signal; nothing was recorded
    Blocked(BlockReason),
    /// The trade was attempted and settled, successfully or not
    Settled(Execution),
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::NoSignal => "no_signal",
            CycleOutcome::BelowConfidence { .. } => "below_confidence",
            CycleOutcome::Blocked(_) => "blocked",
            CycleOutcome::Settled(e) if e.status == ExecutionStatus::Success => "success",
            CycleOutcome::Settled(_) => "failed",
        }
    }
}

/// Watchlist plus held tokens, deduplicated case-insensitively, watchlist order first
fn cycle_tokens(watchlist: &[String], held: impl Iterator<Item = String>) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::with_capacity(watchlist.len());
    for token in watchlist.iter().cloned().chain(held) {
        if !tokens.iter().any(|t| t.eq_ignore_ascii_case(&token)) {
            tokens.push(token);
        }
    }
    tokens
}

pub struct PipelineComponents {
    pub ledger: Arc<dyn LedgerStore>,
    pub chain: Arc<dyn ChainClient>,
    pub snapshots: SnapshotBuilder,
    pub strategies: StrategyEngine,
    pub enhancers: EnhancerChain,
    pub guard: RiskGuard,
    pub router: ExecutionRouter,
    pub settlement: SettlementService,
    /// Tokens snapshotted every cycle, in addition to the agent's holdings
    pub watchlist: Vec<String>,
}

pub struct Pipeline {
    ledger: Arc<dyn LedgerStore>,
    chain: Arc<dyn ChainClient>,
    snapshots: SnapshotBuilder,
    strategies: StrategyEngine,
    enhancers: EnhancerChain,
    guard: RiskGuard,
    router: ExecutionRouter,
    settlement: SettlementService,
    watchlist: Vec<String>,
    agent_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Pipeline {
    pub fn new(parts: PipelineComponents) -> Self {
        Self {
            ledger: parts.ledger,
            chain: parts.chain,
            snapshots: parts.snapshots,
            strategies: parts.strategies,
            enhancers: parts.enhancers,
            guard: parts.guard,
            router: parts.router,
            settlement: parts.settlement,
            watchlist: parts.watchlist,
            agent_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, agent_id: &str) -> Arc<Mutex<()>> {
        self.agent_locks
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run one full cycle for `agent_id`
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, agent_id: &str) -> Result<CycleOutcome> {
        let lock = self.lock_for(agent_id);
        let _in_flight = lock.lock().await;

        let mut agent = self.ledger.load_agent(agent_id).await?;
        agent.wallet_balance = match self.chain.native_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(error = %e, "wallet balance unavailable, trading will be blocked");
                None
            }
        };

        let tokens = cycle_tokens(
            &self.watchlist,
            agent.holdings.iter().map(|h| h.token_address.clone()),
        );
        let markets = self.snapshots.build(&tokens).await;
        agent.revalue_holdings(&markets);

        let Some(signal) = self.strategies.evaluate(&agent, &markets) else {
            debug!("no signal this cycle");
            return Ok(CycleOutcome::NoSignal);
        };
        let signal = self.enhancers.apply(signal, &markets, &agent).await;

        let params = RiskParameters::for_level(agent.risk_level);
        if signal.confidence() < params.min_confidence {
            info!(
                confidence = signal.confidence(),
                min = params.min_confidence,
                "enhanced signal below tier confidence floor"
            );
            return Ok(CycleOutcome::BelowConfidence {
                confidence: signal.confidence(),
                min_confidence: params.min_confidence,
            });
        }

        if let RiskCheckResult::Blocked(reason) = self.guard.check_risk_limits(&agent, &signal).await {
            info!(reason = %reason, token = %signal.token_symbol, "signal blocked by risk guard");
            return Ok(CycleOutcome::Blocked(reason));
        }

        let execution = Execution::begin(&agent.id, signal.clone());
        self.ledger.create_execution(&execution).await?;
        info!(
            execution = %execution.id,
            action = %signal.action,
            token = %signal.token_symbol,
            amount = %signal.amount,
            confidence = signal.confidence(),
            "executing trade"
        );

        let market: Option<&MarketSnapshot> = markets
            .iter()
            .find(|m| m.token_address.eq_ignore_ascii_case(&signal.token_address));
        let outcome = self
            .router
            .route(&signal, market, params.slippage_tolerance_bps, None)
            .await;

        let settled = self.settlement.settle(&agent, execution, outcome, &markets).await?;
        Ok(CycleOutcome::Settled(settled))
    }

    /// One cycle for every active agent, at most `max_concurrent` at a time
    pub async fn run_all(&self, max_concurrent: usize) -> Result<()> {
        let agents = self.ledger.active_agents().await?;
        debug!(agents = agents.len(), "starting cycle round");

        stream::iter(agents)
            .for_each_concurrent(max_concurrent.max(1), |agent_id| async move {
                match self.run_cycle(&agent_id).await {
                    Ok(outcome) => debug!(agent = %agent_id, outcome = outcome.label(), "cycle finished"),
                    Err(e) => error!(agent = %agent_id, error = %e, "cycle failed"),
                }
            })
            .await;
        Ok(())
    }

    /// Run rounds every `interval` until `shutdown` resolves. A round in progress
    /// when shutdown fires is allowed to finish.
    pub async fn run_scheduler<F>(&self, interval: Duration, max_concurrent: usize, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(interval_secs = interval.as_secs(), max_concurrent, "scheduler starting");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_all(max_concurrent).await {
                        error!(error = %e, "cycle round failed");
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown requested, no new cycles will start");
                    break;
                }
            }
        }

        info!("scheduler stopped");
    }
}
