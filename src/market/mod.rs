//! Market snapshot building
//!
//! Combines off-chain market data (ordered provider list) with on-chain curve
//! state into one immutable [`MarketSnapshot`] per watched token. A token whose
//! market data cannot be read is left out of the cycle rather than filled with
//! defaults. A failed curve read marks the token as off the curve.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use crate::domain::{CurveState, MarketData, MarketSnapshot, TimeframeMetrics};
use crate::error::Result;
use crate::providers::{try_in_order, Provider};

#[async_trait]
pub trait MarketDataProvider: Provider {
    async fn market_data(&self, token: &str) -> Result<MarketData>;

    async fn token_metrics(
        &self,
        token: &str,
        timeframes: &[String],
    ) -> Result<HashMap<String, TimeframeMetrics>>;
}

#[async_trait]
pub trait CurveStateReader: Send + Sync {
    async fn curve_state(&self, token: &str) -> Result<CurveState>;

    async fn latest_block(&self) -> Result<u64>;
}

pub struct SnapshotBuilder {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    curve: Arc<dyn CurveStateReader>,
    timeframes: Vec<String>,
    max_concurrency: usize,
}

impl SnapshotBuilder {
    pub fn new(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        curve: Arc<dyn CurveStateReader>,
        timeframes: Vec<String>,
    ) -> Self {
        Self {
            providers,
            curve,
            timeframes,
            max_concurrency: 8,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Build snapshots for `tokens`, preserving watchlist order
    #[instrument(skip(self, tokens), fields(tokens = tokens.len()))]
    pub async fn build(&self, tokens: &[String]) -> Vec<MarketSnapshot> {
        let latest_block = match self.curve.latest_block().await {
            Ok(block) => Some(block),
            Err(e) => {
                warn!(error = %e, "latest block unavailable, age checks disabled this cycle");
                None
            }
        };

        let snapshots: Vec<MarketSnapshot> = stream::iter(tokens.iter().cloned())
            .map(|token| async move {
                match self.snapshot(&token, latest_block).await {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        warn!(token = %token, error = %e, "skipping token, market data unavailable");
                        None
                    }
                }
            })
            .buffered(self.max_concurrency)
            .filter_map(|s| async move { s })
            .collect()
            .await;

        debug!(built = snapshots.len(), "market snapshots ready");
        snapshots
    }

    async fn snapshot(&self, token: &str, latest_block: Option<u64>) -> Result<MarketSnapshot> {
        let data = try_in_order(&self.providers, "market_data", |p| {
            let token = token.to_string();
            async move { p.market_data(&token).await }
        })
        .await?;

        let timeframes = self.timeframes.clone();
        let metrics = try_in_order(&self.providers, "token_metrics", |p| {
            let token = token.to_string();
            let timeframes = timeframes.clone();
            async move { p.token_metrics(&token, &timeframes).await }
        })
        .await?;

        let curve = match self.curve.curve_state(token).await {
            Ok(curve) => curve,
            Err(e) => {
                debug!(token = %token, error = %e, "no curve state, treating token as off the curve");
                CurveState::off_curve()
            }
        };

        Ok(MarketSnapshot::new(token, data, curve)
            .with_metrics(metrics)
            .with_latest_block(latest_block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentflowError;
    use rust_decimal_macros::dec;

    struct StaticMarket {
        name: &'static str,
        missing: Vec<&'static str>,
    }

    impl Provider for StaticMarket {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[async_trait]
    impl MarketDataProvider for StaticMarket {
        async fn market_data(&self, token: &str) -> Result<MarketData> {
            if self.missing.contains(&token) {
                return Err(AgentflowError::MarketDataUnavailable(token.to_string()));
            }
            Ok(MarketData {
                symbol: token.to_uppercase(),
                price_usd: dec!(0.5),
                volume_24h: dec!(12000),
                holders: 80,
                market_cap: dec!(50000),
                liquidity: dec!(9000),
                created_at_block: Some(100),
            })
        }

        async fn token_metrics(
            &self,
            _token: &str,
            timeframes: &[String],
        ) -> Result<HashMap<String, TimeframeMetrics>> {
            Ok(timeframes
                .iter()
                .map(|tf| (tf.clone(), TimeframeMetrics::default()))
                .collect())
        }
    }

    struct Curve {
        block_fails: bool,
    }

    #[async_trait]
    impl CurveStateReader for Curve {
        async fn curve_state(&self, token: &str) -> Result<CurveState> {
            if token == "0xwmon" {
                return Err(AgentflowError::Rpc("execution reverted".into()));
            }
            Ok(CurveState {
                progress_bps: 4000,
                is_graduated: false,
                is_locked: token == "0xlocked",
            })
        }

        async fn latest_block(&self) -> Result<u64> {
            if self.block_fails {
                return Err(AgentflowError::Rpc("timeout".into()));
            }
            Ok(500)
        }
    }

    fn builder(missing_in_primary: Vec<&'static str>, block_fails: bool) -> SnapshotBuilder {
        let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
            Arc::new(StaticMarket {
                name: "primary",
                missing: missing_in_primary,
            }),
            Arc::new(StaticMarket {
                name: "fallback",
                missing: vec!["0xgone"],
            }),
        ];
        SnapshotBuilder::new(
            providers,
            Arc::new(Curve { block_fails }),
            vec!["5m".into(), "1h".into()],
        )
    }

    #[tokio::test]
    async fn test_tokens_without_data_are_skipped() {
        let tokens = vec!["0xa".to_string(), "0xgone".to_string(), "0xlocked".to_string()];
        let snapshots = builder(vec!["0xgone", "0xa"], false).build(&tokens).await;

        let addresses: Vec<&str> = snapshots.iter().map(|s| s.token_address.as_str()).collect();
        assert_eq!(addresses, vec!["0xa", "0xlocked"]);
        assert!(snapshots[1].is_locked);
        assert_eq!(snapshots[0].age_blocks(), Some(400));
        assert!(snapshots[0].short().is_some());
    }

    #[tokio::test]
    async fn test_block_failure_leaves_age_unknown() {
        let snapshots = builder(vec![], true).build(&["0xa".to_string()]).await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].latest_block, None);
    }

    #[tokio::test]
    async fn test_allow_listed_asset_survives_curve_read_failure() {
        let tokens = vec!["0xwmon".to_string(), "0xa".to_string()];
        let snapshots = builder(vec![], false).build(&tokens).await;

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].token_address, "0xwmon");
        assert!(snapshots[0].is_graduated);
        assert!(!snapshots[0].is_locked);
        assert_eq!(snapshots[0].bonding_curve_progress, 0);
        assert!(!snapshots[1].is_graduated);
    }
}
