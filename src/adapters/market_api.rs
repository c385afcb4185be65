//! REST market data provider

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::http::{send_json, HttpEndpoint};
use crate::domain::{MarketData, TimeframeMetrics};
use crate::error::{AgentflowError, Result};
use crate::market::MarketDataProvider;
use crate::providers::Provider;

#[derive(Debug, Deserialize)]
struct MarketResponse {
    symbol: String,
    price_usd: Decimal,
    #[serde(default)]
    volume_24h: Decimal,
    #[serde(default)]
    holders: u64,
    #[serde(default)]
    market_cap: Decimal,
    #[serde(default)]
    liquidity: Decimal,
    #[serde(default)]
    created_at_block: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    metrics: HashMap<String, MetricsEntry>,
}

#[derive(Debug, Deserialize)]
struct MetricsEntry {
    #[serde(default)]
    price_change: f64,
    #[serde(default)]
    volume_change: f64,
    #[serde(default)]
    tx_count: u64,
}

pub struct HttpMarketData {
    endpoint: HttpEndpoint,
    http: Client,
}

impl HttpMarketData {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let http = endpoint.client()?;
        Ok(Self { endpoint, http })
    }
}

impl Provider for HttpMarketData {
    fn name(&self) -> &str {
        &self.endpoint.name
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketData {
    async fn market_data(&self, token: &str) -> Result<MarketData> {
        let url = self.endpoint.url(&format!("token/{}/market", token));
        let request = self.endpoint.authorize(self.http.get(url));
        let body: MarketResponse =
            send_json(request, &self.endpoint.name, AgentflowError::MarketDataUnavailable).await?;
        Ok(MarketData {
            symbol: body.symbol,
            price_usd: body.price_usd,
            volume_24h: body.volume_24h,
            holders: body.holders,
            market_cap: body.market_cap,
            liquidity: body.liquidity,
            created_at_block: body.created_at_block,
        })
    }

    async fn token_metrics(
        &self,
        token: &str,
        timeframes: &[String],
    ) -> Result<HashMap<String, TimeframeMetrics>> {
        let url = self.endpoint.url(&format!("token/{}/metrics", token));
        let request = self
            .endpoint
            .authorize(self.http.get(url))
            .query(&[("timeframes", timeframes.join(","))]);
        let body: MetricsResponse =
            send_json(request, &self.endpoint.name, AgentflowError::MarketDataUnavailable).await?;
        Ok(body
            .metrics
            .into_iter()
            .filter(|(label, _)| timeframes.iter().any(|t| t == label))
            .map(|(label, m)| {
                (
                    label,
                    TimeframeMetrics {
                        price_change_pct: m.price_change,
                        volume_change_pct: m.volume_change,
                        tx_count: m.tx_count,
                    },
                )
            })
            .collect())
    }
}
