//! Venue client boundary

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::domain::{TradeAction, Venue};
use crate::error::VenueError;
use crate::signing::PermitSignature;

pub type VenueResult<T> = std::result::Result<T, VenueError>;

/// What to swap. Buys spend native for `token`, sells spend `token` for native.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub token: Address,
    pub action: TradeAction,
    /// Input amount in base units
    pub amount_in: U256,
    pub recipient: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueQuote {
    pub venue: Venue,
    pub token: Address,
    pub action: TradeAction,
    pub amount_in: U256,
    pub expected_out: U256,
    /// Contract that pulls the input token on sells
    pub spender: Option<Address>,
    /// Venue-specific routing payload passed back to `build`
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl VenueQuote {
    /// Reject quotes that can never execute
    pub fn validate(&self) -> VenueResult<()> {
        if self.amount_in.is_zero() {
            return Err(VenueError::QuoteInvalid("zero input amount".into()));
        }
        if self.expected_out.is_zero() {
            return Err(VenueError::QuoteInvalid("zero expected output".into()));
        }
        Ok(())
    }

    /// Expected output reduced by the slippage tolerance
    pub fn min_out(&self, slippage_bps: u32) -> U256 {
        let keep = 10_000u32.saturating_sub(slippage_bps);
        self.expected_out * U256::from(keep) / U256::from(10_000u32)
    }
}

/// How the venue may move the input leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendAuthorization {
    /// Native input, sent as transaction value
    Native,
    /// Allowance already granted with an approve transaction
    Approved,
    /// Single-transaction permit bundled with the swap
    Permit(PermitSignature),
}

/// Unsigned transaction ready for the chain client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTx {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<U256>,
}

#[async_trait]
pub trait VenueClient: Send + Sync {
    fn venue(&self) -> Venue;

    /// Whether the venue can route `token`
    async fn lists(&self, token: Address) -> VenueResult<bool>;

    async fn quote(&self, request: &QuoteRequest) -> VenueResult<VenueQuote>;

    /// Build the swap transaction. Venues that cannot take a permit return
    /// [`VenueError::PermitUnsupported`].
    async fn build(
        &self,
        quote: &VenueQuote,
        slippage_bps: u32,
        authorization: &SpendAuthorization,
    ) -> VenueResult<SwapTx>;
}
