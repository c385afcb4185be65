//! Settlement of a routed trade
//!
//! Turns a router outcome into exactly one terminal execution record plus, on
//! success, the metrics, cost-basis and delegation updates that go with it. All
//! ledger writes for one execution are committed as one batch; side effects are
//! enqueued only after that commit.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::domain::{
    AgentContext, Execution, MarketSnapshot, RouteFill, TokenPosition, TradeAction,
};
use crate::error::{AgentflowError, Result};

use super::cost_basis::{apply_buy, apply_sell};
use super::distribution::distribute;
use super::ledger::{AgentMetricsUpdate, DelegationCredit, LedgerStore, SettlementBatch};
use super::metrics::compute_metrics;
use super::outbox::{Outbox, SideEffect};
use super::pnl::{PnlCalculator, TradeLegs};

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Fee taken from positive delegator shares
    #[serde(default = "default_performance_fee_bps")]
    pub performance_fee_bps: u32,
    /// Price-source key for the native asset
    #[serde(default = "default_native_asset")]
    pub native_asset: String,
    /// Tries for each settlement batch commit
    #[serde(default = "default_commit_attempts")]
    pub commit_attempts: u32,
    /// Backoff before the second commit try, doubled after each failure
    #[serde(default = "default_commit_backoff_ms")]
    pub commit_backoff_ms: u64,
}

fn default_performance_fee_bps() -> u32 {
    2000
}

fn default_native_asset() -> String {
    "MON".to_string()
}

fn default_commit_attempts() -> u32 {
    3
}

fn default_commit_backoff_ms() -> u64 {
    200
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            performance_fee_bps: default_performance_fee_bps(),
            native_asset: default_native_asset(),
            commit_attempts: default_commit_attempts(),
            commit_backoff_ms: default_commit_backoff_ms(),
        }
    }
}

pub struct SettlementService {
    ledger: Arc<dyn LedgerStore>,
    pnl: PnlCalculator,
    outbox: Outbox,
    config: SettlementConfig,
}

impl SettlementService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        pnl: PnlCalculator,
        outbox: Outbox,
        config: SettlementConfig,
    ) -> Self {
        Self {
            ledger,
            pnl,
            outbox,
            config,
        }
    }

    /// Finalize `execution` from the router outcome
    #[instrument(skip_all, fields(agent = %agent.id, execution = %execution.id))]
    pub async fn settle(
        &self,
        agent: &AgentContext,
        execution: Execution,
        outcome: Result<RouteFill>,
        markets: &[MarketSnapshot],
    ) -> Result<Execution> {
        match outcome {
            Ok(fill) => self.settle_success(agent, execution, fill, markets).await,
            Err(e) => self.settle_failure(execution, &e).await,
        }
    }

    async fn settle_success(
        &self,
        agent: &AgentContext,
        mut execution: Execution,
        fill: RouteFill,
        markets: &[MarketSnapshot],
    ) -> Result<Execution> {
        let token = execution.params.token_address.clone();
        let action = execution.kind;
        let token_price = markets
            .iter()
            .find(|m| m.token_address.eq_ignore_ascii_case(&token))
            .map(|m| (token.as_str(), m.price_usd));

        let legs = TradeLegs::from_fill(action, &token, &self.config.native_asset, &fill);
        let pnl = match self.pnl.pnl_usd(&legs, token_price).await {
            Ok(pnl) => pnl,
            Err(e) => {
                warn!(error = %e, "trade could not be valued, recording zero pnl");
                Decimal::ZERO
            }
        };

        execution.mark_success(fill.clone(), pnl)?;

        let batch = match self.derived_updates(agent, &execution, &fill, pnl).await {
            Ok((agent_update, position, delegation_credits)) => SettlementBatch {
                execution: execution.clone(),
                agent_update: Some(agent_update),
                position,
                delegation_credits,
            },
            Err(e) => {
                error!(
                    tx_hash = %fill.tx_hash,
                    error = %e,
                    reconcile = true,
                    "ledger reads failed after a confirmed trade, committing the execution alone"
                );
                SettlementBatch::execution_only(execution.clone())
            }
        };
        let fee_total: Decimal = batch.delegation_credits.iter().map(|c| c.fee).sum();
        self.commit(&batch).await?;

        info!(
            tx_hash = %fill.tx_hash,
            venue = %fill.venue,
            pnl_usd = %pnl,
            delegations = batch.delegation_credits.len(),
            "execution settled"
        );

        self.outbox.enqueue(SideEffect::ReputationFeedback {
            agent_id: agent.id.clone(),
            execution_id: execution.id,
            success: true,
            pnl_usd: pnl,
        });
        if fee_total > dec!(0) {
            self.outbox.enqueue(SideEffect::FeeRecord {
                agent_id: agent.id.clone(),
                execution_id: execution.id,
                fee_total,
            });
        }
        self.enqueue_artifact(&execution);

        Ok(execution)
    }

    /// Metrics, cost basis and delegation credits that follow from a settled fill
    async fn derived_updates(
        &self,
        agent: &AgentContext,
        execution: &Execution,
        fill: &RouteFill,
        pnl: Decimal,
    ) -> Result<(AgentMetricsUpdate, Option<TokenPosition>, Vec<DelegationCredit>)> {
        let token = execution.params.token_address.as_str();

        let mut history = self.ledger.successful_pnls(&agent.id).await?;
        history.push(pnl);
        let metrics = compute_metrics(&history, agent.total_capital, agent.total_pnl + pnl);

        let existing = self.ledger.token_position(&agent.id, token).await?;
        let position = match execution.kind {
            TradeAction::Buy => {
                let base = existing.unwrap_or_else(|| {
                    TokenPosition::empty(&agent.id, token, &execution.params.token_symbol)
                });
                Some(apply_buy(base, fill.amount_in, fill.amount_out))
            }
            TradeAction::Sell => {
                let updated = apply_sell(existing, fill.amount_in, fill.amount_out);
                if updated.is_none() {
                    warn!(token = %token, "sell settled without a recorded position");
                }
                updated
            }
        };

        let delegations = self.ledger.active_delegations(&agent.id).await?;
        let credits = distribute(
            &delegations,
            agent.total_capital,
            pnl,
            self.config.performance_fee_bps,
        );

        Ok((
            AgentMetricsUpdate {
                agent_id: agent.id.clone(),
                metrics,
            },
            position,
            credits,
        ))
    }

    async fn settle_failure(&self, mut execution: Execution, cause: &AgentflowError) -> Result<Execution> {
        execution.mark_failed(cause.to_string())?;
        self.commit(&SettlementBatch::execution_only(execution.clone())).await?;

        info!(error = %cause, "execution failed");
        self.outbox.enqueue(SideEffect::ReputationFeedback {
            agent_id: execution.agent_id.clone(),
            execution_id: execution.id,
            success: false,
            pnl_usd: Decimal::ZERO,
        });
        self.enqueue_artifact(&execution);
        Ok(execution)
    }

    /// Commit, backing off and retrying transient storage errors
    async fn commit(&self, batch: &SettlementBatch) -> Result<()> {
        let attempts = self.config.commit_attempts.max(1);
        let mut backoff = Duration::from_millis(self.config.commit_backoff_ms);
        let mut attempt = 1;
        loop {
            match self.ledger.commit_settlement(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        execution = %batch.execution.id,
                        attempt,
                        error = %e,
                        "settlement commit failed, retrying"
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        execution = %batch.execution.id,
                        status = %batch.execution.status,
                        tx_hash = ?batch.execution.tx_hash,
                        attempts,
                        error = %e,
                        "settlement batch failed to commit"
                    );
                    return Err(e);
                }
            }
        }
    }

    fn enqueue_artifact(&self, execution: &Execution) {
        match serde_json::to_value(execution) {
            Ok(payload) => self.outbox.enqueue(SideEffect::ValidationArtifact {
                agent_id: execution.agent_id.clone(),
                execution_id: execution.id,
                payload,
            }),
            Err(e) => warn!(error = %e, "validation artifact not serializable"),
        }
    }
}
