//! Solver network venue
//!
//! Quotes are firm for a short window and identified by `quote_id`; the build call
//! returns settlement calldata that accepts a bundled permit.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::aggregator::NATIVE_PLACEHOLDER;
use super::http::HttpEndpoint;
use crate::domain::{TradeAction, Venue};
use crate::error::{AgentflowError, Result, VenueError};
use crate::execution::{QuoteRequest, SpendAuthorization, SwapTx, VenueClient, VenueQuote, VenueResult};
use crate::signing::PermitSignature;

#[derive(Debug, Serialize)]
struct SolverQuoteRequest {
    sell_token: Address,
    buy_token: Address,
    sell_amount: U256,
    from: Address,
}

#[derive(Debug, Deserialize)]
struct SolverQuote {
    quote_id: String,
    buy_amount: U256,
    #[serde(default)]
    spender: Option<Address>,
}

#[derive(Debug, Serialize)]
struct SolverSwapRequest<'a> {
    quote_id: &'a str,
    slippage_bps: u32,
    min_buy_amount: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    permit: Option<SolverPermit>,
}

/// Permit in the solver's wire form, signature halves as 0x-prefixed hex
#[derive(Debug, Serialize)]
struct SolverPermit {
    owner: Address,
    spender: Address,
    value: U256,
    deadline: U256,
    v: u8,
    r: String,
    s: String,
}

impl From<&PermitSignature> for SolverPermit {
    fn from(permit: &PermitSignature) -> Self {
        Self {
            owner: permit.owner,
            spender: permit.spender,
            value: permit.value,
            deadline: permit.deadline,
            v: permit.v,
            r: format!("0x{}", hex::encode(permit.r)),
            s: format!("0x{}", hex::encode(permit.s)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SolverSwap {
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: U256,
    #[serde(default)]
    gas: Option<U256>,
}

pub struct SolverVenue {
    endpoint: HttpEndpoint,
    http: Client,
    native: Address,
}

impl SolverVenue {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let http = endpoint.client()?;
        let native = NATIVE_PLACEHOLDER
            .parse()
            .map_err(|e| AgentflowError::AddressParsing(format!("{}", e)))?;
        Ok(Self {
            endpoint,
            http,
            native,
        })
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        fail: fn(String) -> VenueError,
    ) -> VenueResult<T> {
        let response = self
            .endpoint
            .authorize(self.http.post(self.endpoint.url(path)))
            .json(body)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            // Solver refuses the order outright
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::QuoteInvalid(body.chars().take(200).collect()));
        }
        if !status.is_success() {
            return Err(fail(format!("{} returned {}", path, status)));
        }
        response.json::<T>().await.map_err(|e| fail(e.to_string()))
    }
}

#[async_trait]
impl VenueClient for SolverVenue {
    fn venue(&self) -> Venue {
        Venue::Solver
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
        let (sell_token, buy_token) = match request.action {
            TradeAction::Buy => (self.native, request.token),
            TradeAction::Sell => (request.token, self.native),
        };
        let body = SolverQuoteRequest {
            sell_token,
            buy_token,
            sell_amount: request.amount_in,
            from: request.recipient,
        };
        let quote: SolverQuote = self.post("quote", &body, VenueError::QuoteUnavailable).await?;

        Ok(VenueQuote {
            venue: Venue::Solver,
            token: request.token,
            action: request.action,
            amount_in: request.amount_in,
            expected_out: quote.buy_amount,
            spender: quote.spender,
            meta: json!({ "quote_id": quote.quote_id }),
        })
    }

    async fn build(
        &self,
        quote: &VenueQuote,
        slippage_bps: u32,
        authorization: &SpendAuthorization,
    ) -> VenueResult<SwapTx> {
        let quote_id = quote
            .meta
            .get("quote_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| VenueError::Build("quote carries no quote_id".into()))?;
        let body = SolverSwapRequest {
            quote_id,
            slippage_bps,
            min_buy_amount: quote.min_out(slippage_bps),
            permit: match authorization {
                SpendAuthorization::Permit(permit) => Some(SolverPermit::from(permit)),
                _ => None,
            },
        };
        let swap: SolverSwap = self.post("swap", &body, VenueError::Build).await?;
        Ok(SwapTx {
            to: swap.to,
            data: swap.data,
            value: swap.value,
            gas: swap.gas,
        })
    }
}
