//! Outbox delivery targets

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::http::HttpEndpoint;
use crate::error::{AgentflowError, Result};
use crate::settlement::{SideEffect, SideEffectSink};

/// Posts each side effect as JSON to `{base_url}/{kind}`
pub struct HttpSideEffectSink {
    endpoint: HttpEndpoint,
    http: Client,
}

impl HttpSideEffectSink {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let http = endpoint.client()?;
        Ok(Self { endpoint, http })
    }
}

#[async_trait]
impl SideEffectSink for HttpSideEffectSink {
    async fn deliver(&self, effect: &SideEffect) -> Result<()> {
        let response = self
            .endpoint
            .authorize(self.http.post(self.endpoint.url(effect.kind())))
            .json(effect)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AgentflowError::Internal(format!(
                "{} delivery returned {}",
                effect.kind(),
                status
            )));
        }
        Ok(())
    }
}

/// Logs side effects instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl SideEffectSink for TracingSink {
    async fn deliver(&self, effect: &SideEffect) -> Result<()> {
        let payload = serde_json::to_string(effect)?;
        info!(
            kind = effect.kind(),
            execution_id = %effect.execution_id(),
            payload = %payload,
            "side effect recorded"
        );
        Ok(())
    }
}
