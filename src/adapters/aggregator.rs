//! DEX aggregator venue over its REST API

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::http::HttpEndpoint;
use crate::domain::{TradeAction, Venue};
use crate::error::{Result, VenueError};
use crate::execution::{QuoteRequest, SpendAuthorization, SwapTx, VenueClient, VenueQuote, VenueResult};

/// Placeholder address aggregators use for the native asset
pub const NATIVE_PLACEHOLDER: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    amount_out: U256,
    #[serde(default)]
    spender: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: U256,
    #[serde(default)]
    gas: Option<U256>,
}

pub struct AggregatorVenue {
    endpoint: HttpEndpoint,
    http: Client,
    native: Address,
}

impl AggregatorVenue {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let http = endpoint.client()?;
        let native = NATIVE_PLACEHOLDER
            .parse()
            .map_err(|e| crate::error::AgentflowError::AddressParsing(format!("{}", e)))?;
        Ok(Self {
            endpoint,
            http,
            native,
        })
    }

    fn pair(&self, action: TradeAction, token: Address) -> (Address, Address) {
        match action {
            TradeAction::Buy => (self.native, token),
            TradeAction::Sell => (token, self.native),
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
        fail: fn(String) -> VenueError,
    ) -> VenueResult<T> {
        let response = self
            .endpoint
            .authorize(self.http.get(self.endpoint.url(path)))
            .query(query)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fail(format!("{} {}", status, body.chars().take(200).collect::<String>())));
        }
        response.json::<T>().await.map_err(|e| fail(e.to_string()))
    }
}

#[async_trait]
impl VenueClient for AggregatorVenue {
    fn venue(&self) -> Venue {
        Venue::Aggregator
    }

    async fn lists(&self, token: Address) -> VenueResult<bool> {
        let response = self
            .endpoint
            .authorize(self.http.get(self.endpoint.url(&format!("tokens/{:?}", token))))
            .send()
            .await
            .map_err(|e| VenueError::QuoteUnavailable(e.to_string()))?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(VenueError::QuoteUnavailable(format!("token lookup returned {}", s))),
        }
    }

    async fn quote(&self, request: &QuoteRequest) -> VenueResult<VenueQuote> {
        let (token_in, token_out) = self.pair(request.action, request.token);
        let body: QuoteResponse = self
            .get(
                "quote",
                &[
                    ("tokenIn", format!("{:?}", token_in)),
                    ("tokenOut", format!("{:?}", token_out)),
                    ("amountIn", request.amount_in.to_string()),
                ],
                VenueError::QuoteUnavailable,
            )
            .await?;

        Ok(VenueQuote {
            venue: Venue::Aggregator,
            token: request.token,
            action: request.action,
            amount_in: request.amount_in,
            expected_out: body.amount_out,
            spender: body.spender,
            meta: json!({ "recipient": format!("{:?}", request.recipient) }),
        })
    }

    async fn build(
        &self,
        quote: &VenueQuote,
        slippage_bps: u32,
        authorization: &SpendAuthorization,
    ) -> VenueResult<SwapTx> {
        if matches!(authorization, SpendAuthorization::Permit(_)) {
            return Err(VenueError::PermitUnsupported);
        }
        let (token_in, token_out) = self.pair(quote.action, quote.token);
        let recipient = quote
            .meta
            .get("recipient")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let body: SwapResponse = self
            .get(
                "swap",
                &[
                    ("tokenIn", format!("{:?}", token_in)),
                    ("tokenOut", format!("{:?}", token_out)),
                    ("amountIn", quote.amount_in.to_string()),
                    ("minAmountOut", quote.min_out(slippage_bps).to_string()),
                    ("slippageBps", slippage_bps.to_string()),
                    ("recipient", recipient),
                ],
                VenueError::Build,
            )
            .await?;

        Ok(SwapTx {
            to: body.to,
            data: body.data,
            value: body.value,
            gas: body.gas,
        })
    }
}
