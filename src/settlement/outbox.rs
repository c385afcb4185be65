//! Post-settlement side-effect outbox
//!
//! Side effects are enqueued after the settlement batch commits and delivered by a
//! background worker with bounded exponential-backoff retries. Nothing here can fail
//! or delay a trade: a full queue drops the item, an exhausted item is logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    /// Reputation signal derived from the trade outcome
    ReputationFeedback {
        agent_id: String,
        execution_id: Uuid,
        success: bool,
        pnl_usd: Decimal,
    },
    /// Performance fees withheld from delegator credits
    FeeRecord {
        agent_id: String,
        execution_id: Uuid,
        fee_total: Decimal,
    },
    /// Auditable snapshot of the settled execution
    ValidationArtifact {
        agent_id: String,
        execution_id: Uuid,
        payload: serde_json::Value,
    },
}

impl SideEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::ReputationFeedback { .. } => "reputation_feedback",
            SideEffect::FeeRecord { .. } => "fee_record",
            SideEffect::ValidationArtifact { .. } => "validation_artifact",
        }
    }

    pub fn execution_id(&self) -> Uuid {
        match self {
            SideEffect::ReputationFeedback { execution_id, .. }
            | SideEffect::FeeRecord { execution_id, .. }
            | SideEffect::ValidationArtifact { execution_id, .. } => *execution_id,
        }
    }
}

#[async_trait]
pub trait SideEffectSink: Send + Sync {
    async fn deliver(&self, effect: &SideEffect) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl OutboxConfig {
    fn backoff_duration(&self, attempt: u32) -> Duration {
        let delay = self
            .base_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

#[derive(Debug, Default)]
pub struct OutboxStats {
    pub enqueued: AtomicU64,
    pub dropped: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

/// Producer handle, cheap to clone
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<SideEffect>,
    stats: Arc<OutboxStats>,
}

impl Outbox {
    /// Create the queue and spawn its delivery worker
    pub fn spawn(config: OutboxConfig, sink: Arc<dyn SideEffectSink>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let stats = Arc::new(OutboxStats::default());
        let worker = tokio::spawn(run_worker(rx, sink, config, Arc::clone(&stats)));
        (Self { tx, stats }, worker)
    }

    /// Enqueue without waiting; a full or closed queue drops the item
    pub fn enqueue(&self, effect: SideEffect) {
        let kind = effect.kind();
        let execution_id = effect.execution_id();
        match self.tx.try_send(effect) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                debug!(kind, %execution_id, "side effect enqueued");
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind, %execution_id, error = %e, "side effect dropped");
            }
        }
    }

    pub fn stats(&self) -> &OutboxStats {
        &self.stats
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<SideEffect>,
    sink: Arc<dyn SideEffectSink>,
    config: OutboxConfig,
    stats: Arc<OutboxStats>,
) {
    info!("side-effect outbox worker started");
    while let Some(effect) = rx.recv().await {
        if deliver_with_retry(sink.as_ref(), &effect, &config).await {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    info!("side-effect outbox worker stopped");
}

async fn deliver_with_retry(sink: &dyn SideEffectSink, effect: &SideEffect, config: &OutboxConfig) -> bool {
    let attempts = config.max_attempts.max(1);
    for attempt in 0..attempts {
        match sink.deliver(effect).await {
            Ok(()) => return true,
            Err(e) if attempt + 1 < attempts => {
                let delay = config.backoff_duration(attempt);
                warn!(
                    kind = effect.kind(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "side effect delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    kind = effect.kind(),
                    execution_id = %effect.execution_id(),
                    error = %e,
                    "side effect delivery exhausted retries"
                );
            }
        }
    }
    false
}
