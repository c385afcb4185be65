//! Shared HTTP plumbing for JSON API adapters

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AgentflowError, Result};

/// One HTTP endpoint in an ordered provider list
#[derive(Debug, Clone, Deserialize)]
pub struct HttpEndpoint {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl HttpEndpoint {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(concat!("agentflow/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(self.timeout_ms))
            .build()
            .map_err(|e| AgentflowError::Internal(format!("failed to build HTTP client for {}: {}", self.name, e)))
    }

    /// Attach the API key header when one is configured
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }
}

/// Send and decode a JSON response, mapping non-2xx statuses through `fail`
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    what: &str,
    fail: fn(String) -> AgentflowError,
) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(fail(format!(
            "{} returned {}: {}",
            what,
            status,
            body.chars().take(200).collect::<String>()
        )));
    }
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let endpoint = HttpEndpoint::new("api", "https://api.example.com/v1/");
        assert_eq!(endpoint.url("/token/0xabc"), "https://api.example.com/v1/token/0xabc");
    }
}
