//! REST confidence oracle

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{send_json, HttpEndpoint};
use crate::domain::{AgentContext, MarketSnapshot, TradeSignal};
use crate::enhancer::{Enhancement, SignalEnhancer};
use crate::error::{AgentflowError, Result};
use crate::providers::Provider;

#[derive(Debug, Serialize)]
struct EnhanceRequest<'a> {
    agent_id: &'a str,
    strategy: &'a str,
    risk_level: &'a str,
    signal: &'a TradeSignal,
    /// Only the snapshot of the signalled token is sent
    market: Option<&'a MarketSnapshot>,
}

#[derive(Debug, Deserialize)]
struct EnhanceResponse {
    adjusted_confidence: f64,
    #[serde(default)]
    used: bool,
}

pub struct HttpSignalEnhancer {
    endpoint: HttpEndpoint,
    http: Client,
}

impl HttpSignalEnhancer {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let http = endpoint.client()?;
        Ok(Self { endpoint, http })
    }
}

impl Provider for HttpSignalEnhancer {
    fn name(&self) -> &str {
        &self.endpoint.name
    }
}

#[async_trait]
impl SignalEnhancer for HttpSignalEnhancer {
    async fn enhance(
        &self,
        signal: &TradeSignal,
        markets: &[MarketSnapshot],
        agent: &AgentContext,
    ) -> Result<Enhancement> {
        let body = EnhanceRequest {
            agent_id: &agent.id,
            strategy: agent.strategy.as_str(),
            risk_level: agent.risk_level.as_str(),
            signal,
            market: markets
                .iter()
                .find(|m| m.token_address.eq_ignore_ascii_case(&signal.token_address)),
        };
        let request = self
            .endpoint
            .authorize(self.http.post(self.endpoint.url("enhance")))
            .json(&body);
        let response: EnhanceResponse =
            send_json(request, &self.endpoint.name, AgentflowError::Enhancer).await?;
        Ok(Enhancement {
            adjusted_confidence: response.adjusted_confidence,
            used: response.used,
        })
    }
}
