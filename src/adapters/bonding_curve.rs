//! Launch platform bonding-curve venue
//!
//! Quotes come from the lens contract, which also names the router that will
//! execute the trade. Calldata is encoded locally against that router.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};
use serde_json::json;
use tracing::debug;

use super::contracts::{CurveLens, CurveRouter};
use crate::domain::{TradeAction, Venue};
use crate::error::VenueError;
use crate::execution::{QuoteRequest, SpendAuthorization, SwapTx, VenueClient, VenueQuote, VenueResult};

/// Swap deadline relative to build time
const DEADLINE_SECS: u64 = 300;

pub struct BondingCurveVenue {
    provider: Arc<Provider<Http>>,
    lens: CurveLens<Provider<Http>>,
}

impl BondingCurveVenue {
    pub fn new(provider: Arc<Provider<Http>>, lens_address: Address) -> Self {
        let lens = CurveLens::new(lens_address, Arc::clone(&provider));
        Self { provider, lens }
    }

    fn router_of(quote: &VenueQuote) -> VenueResult<Address> {
        quote
            .meta
            .get("router")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| VenueError::Build("quote carries no router address".into()))
    }
}

fn deadline() -> U256 {
    U256::from(Utc::now().timestamp().max(0) as u64 + DEADLINE_SECS)
}

#[async_trait]
impl VenueClient for BondingCurveVenue {
    fn venue(&self) -> Venue {
        Venue::BondingCurve
    }

    async fn lists(&self, token: Address) -> VenueResult<bool> {
        let (_, graduated, locked) = self
            .lens
            .get_curve_state(token)
            .call()
            .await
            .map_err(|e| VenueError::QuoteUnavailable(e.to_string()))?;
        Ok(!graduated && !locked)
    }

    async fn quote(&self, request: &QuoteRequest) -> VenueResult<VenueQuote> {
        let (router, amount_out) = self
            .lens
            .get_amount_out(request.token, request.amount_in, request.action.is_buy())
            .call()
            .await
            .map_err(|e| VenueError::QuoteUnavailable(format!("getAmountOut: {}", e)))?;
        if router.is_zero() {
            return Err(VenueError::QuoteInvalid("lens returned no router".into()));
        }
        debug!(router = ?router, amount_out = %amount_out, "curve quote");

        Ok(VenueQuote {
            venue: Venue::BondingCurve,
            token: request.token,
            action: request.action,
            amount_in: request.amount_in,
            expected_out: amount_out,
            spender: match request.action {
                TradeAction::Buy => None,
                TradeAction::Sell => Some(router),
            },
            meta: json!({
                "router": format!("{:?}", router),
                "recipient": format!("{:?}", request.recipient),
            }),
        })
    }

    async fn build(
        &self,
        quote: &VenueQuote,
        slippage_bps: u32,
        authorization: &SpendAuthorization,
    ) -> VenueResult<SwapTx> {
        let router_address = Self::router_of(quote)?;
        let recipient: Address = quote
            .meta
            .get("recipient")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| VenueError::Build("quote carries no recipient".into()))?;
        let router = CurveRouter::new(router_address, Arc::clone(&self.provider));
        let min_out = quote.min_out(slippage_bps);

        let (call, value) = match (quote.action, authorization) {
            (TradeAction::Buy, _) => (
                router.buy(min_out, quote.token, recipient, deadline()).calldata(),
                quote.amount_in,
            ),
            (TradeAction::Sell, SpendAuthorization::Permit(permit)) => (
                router
                    .sell_permit(
                        quote.amount_in,
                        min_out,
                        quote.token,
                        recipient,
                        permit.deadline,
                        permit.v,
                        permit.r,
                        permit.s,
                    )
                    .calldata(),
                U256::zero(),
            ),
            (TradeAction::Sell, _) => (
                router
                    .sell(quote.amount_in, min_out, quote.token, recipient, deadline())
                    .calldata(),
                U256::zero(),
            ),
        };

        let data = call.ok_or_else(|| VenueError::Build("router calldata encoding failed".into()))?;
        Ok(SwapTx {
            to: router_address,
            data,
            value,
            gas: None,
        })
    }
}
