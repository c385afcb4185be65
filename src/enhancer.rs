//! Optional confidence oracle
//!
//! Enhancers are advisory. Any failure, or an oracle that declines to weigh in,
//! leaves the signal exactly as the strategy produced it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{AgentContext, MarketSnapshot, TradeSignal};
use crate::error::Result;
use crate::providers::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    pub adjusted_confidence: f64,
    pub used: bool,
}

#[async_trait]
pub trait SignalEnhancer: Provider {
    async fn enhance(
        &self,
        signal: &TradeSignal,
        markets: &[MarketSnapshot],
        agent: &AgentContext,
    ) -> Result<Enhancement>;
}

/// Ordered enhancer list; the first oracle that weighs in wins
#[derive(Clone, Default)]
pub struct EnhancerChain {
    providers: Vec<Arc<dyn SignalEnhancer>>,
}

impl EnhancerChain {
    pub fn new(providers: Vec<Arc<dyn SignalEnhancer>>) -> Self {
        Self { providers }
    }

    pub async fn apply(
        &self,
        mut signal: TradeSignal,
        markets: &[MarketSnapshot],
        agent: &AgentContext,
    ) -> TradeSignal {
        for provider in &self.providers {
            match provider.enhance(&signal, markets, agent).await {
                Ok(enhancement) if enhancement.used => {
                    let before = signal.confidence();
                    signal.apply_enhancement(provider.name(), enhancement.adjusted_confidence);
                    info!(
                        agent = %agent.id,
                        provider = provider.name(),
                        before,
                        after = signal.confidence(),
                        "signal confidence adjusted"
                    );
                    return signal;
                }
                Ok(_) => {
                    debug!(agent = %agent.id, provider = provider.name(), "enhancer declined");
                }
                Err(e) => {
                    warn!(agent = %agent.id, provider = provider.name(), error = %e, "signal enhancer unavailable");
                }
            }
        }
        signal
    }
}
