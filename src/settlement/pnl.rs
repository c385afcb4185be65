//! Trade PnL valuation

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::{RouteFill, TradeAction};
use crate::error::{AgentflowError, Result};
use crate::providers::{try_in_order, Provider};

/// USD reference price for an asset (token address or native symbol)
#[async_trait]
pub trait PriceSource: Provider {
    async fn price_of(&self, asset: &str) -> Result<Decimal>;
}

/// The two legs of a settled trade
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLegs<'a> {
    pub input_asset: &'a str,
    pub input_amount: Decimal,
    pub output_asset: &'a str,
    pub output_amount: Decimal,
}

impl<'a> TradeLegs<'a> {
    /// Buys spend native for tokens, sells the reverse
    pub fn from_fill(action: TradeAction, token: &'a str, native: &'a str, fill: &RouteFill) -> Self {
        let (input_asset, output_asset) = match action {
            TradeAction::Buy => (native, token),
            TradeAction::Sell => (token, native),
        };
        Self {
            input_asset,
            input_amount: fill.amount_in,
            output_asset,
            output_amount: fill.amount_out,
        }
    }
}

pub struct PnlCalculator {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl PnlCalculator {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self { sources }
    }

    /// Reference price, falling back to a price observed this cycle
    pub async fn price(&self, asset: &str, observed: Option<Decimal>) -> Result<Decimal> {
        let quoted = try_in_order(&self.sources, "price_of", |p| {
            let asset = asset.to_string();
            async move { p.price_of(&asset).await }
        })
        .await;
        match (quoted, observed) {
            (Ok(price), _) => Ok(price),
            (Err(e), Some(price)) => {
                warn!(asset, error = %e, "reference price unavailable, using cycle snapshot");
                Ok(price)
            }
            (Err(_), None) => Err(AgentflowError::PriceUnavailable(asset.to_string())),
        }
    }

    /// `value(out) - value(in)` in USD
    pub async fn pnl_usd(&self, legs: &TradeLegs<'_>, token_price_hint: Option<(&str, Decimal)>) -> Result<Decimal> {
        let hint = |asset: &str| {
            token_price_hint
                .filter(|(a, _)| a.eq_ignore_ascii_case(asset))
                .map(|(_, p)| p)
        };
        let in_price = self.price(legs.input_asset, hint(legs.input_asset)).await?;
        let out_price = self.price(legs.output_asset, hint(legs.output_asset)).await?;
        Ok(legs.output_amount * out_price - legs.input_amount * in_price)
    }
}
