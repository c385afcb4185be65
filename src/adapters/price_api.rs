//! REST reference price source

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::http::{send_json, HttpEndpoint};
use crate::error::{AgentflowError, Result};
use crate::providers::Provider;
use crate::settlement::PriceSource;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price_usd: Option<Decimal>,
}

pub struct HttpPriceSource {
    endpoint: HttpEndpoint,
    http: Client,
}

impl HttpPriceSource {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let http = endpoint.client()?;
        Ok(Self { endpoint, http })
    }
}

impl Provider for HttpPriceSource {
    fn name(&self) -> &str {
        &self.endpoint.name
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn price_of(&self, asset: &str) -> Result<Decimal> {
        let request = self
            .endpoint
            .authorize(self.http.get(self.endpoint.url("price")))
            .query(&[("asset", asset)]);
        let body: PriceResponse =
            send_json(request, &self.endpoint.name, AgentflowError::PriceUnavailable).await?;
        match body.price_usd {
            Some(price) if price > Decimal::ZERO => Ok(price),
            _ => Err(AgentflowError::PriceUnavailable(asset.to_string())),
        }
    }
}
