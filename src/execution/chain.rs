//! Chain client boundary

use async_trait::async_trait;
use ethers::types::{Address, Log, H256, U256};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::signing::PermitSignature;

use super::venue::{SwapTx, VenueResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub success: bool,
    pub gas_used: Option<U256>,
    pub block_number: Option<u64>,
    pub logs: Vec<Log>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Trading wallet address
    fn address(&self) -> Address;

    /// Native balance of the trading wallet, in whole units
    async fn native_balance(&self) -> Result<Decimal>;

    async fn latest_block(&self) -> Result<u64>;

    /// ERC-20 `decimals()` of `token`
    async fn token_decimals(&self, token: Address) -> VenueResult<u32>;

    async fn sign_permit(
        &self,
        token: Address,
        spender: Address,
        value: U256,
        deadline: U256,
    ) -> VenueResult<PermitSignature>;

    /// Grant `spender` an allowance of `value`, returning once the approval is mined
    async fn approve(&self, token: Address, spender: Address, value: U256) -> VenueResult<()>;

    async fn send(&self, tx: &SwapTx) -> VenueResult<H256>;

    /// Receipt if mined, `None` while pending
    async fn receipt(&self, tx_hash: H256) -> VenueResult<Option<TxReceipt>>;
}
