//! Chain client that never broadcasts

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use rust_decimal::Decimal;
use tracing::info;

use super::contracts::PermitToken;
use crate::error::{Result, VenueError};
use crate::execution::units::NATIVE_DECIMALS;
use crate::execution::{ChainClient, SwapTx, TxReceipt, VenueResult};
use crate::signing::PermitSignature;

/// Synthetic hashes, immediately successful receipts and a fixed balance.
///
/// Token decimals come from explicit overrides, then from the RPC provider when
/// one is attached, then default to 18.
pub struct DryRunChain {
    address: Address,
    balance: Decimal,
    sequence: AtomicU64,
    block: AtomicU64,
    decimals: HashMap<Address, u32>,
    reader: Option<Arc<Provider<Http>>>,
}

impl DryRunChain {
    pub fn new(address: Address, balance: Decimal) -> Self {
        Self {
            address,
            balance,
            sequence: AtomicU64::new(0),
            block: AtomicU64::new(1),
            decimals: HashMap::new(),
            reader: None,
        }
    }

    pub fn with_token_decimals(mut self, token: Address, decimals: u32) -> Self {
        self.decimals.insert(token, decimals);
        self
    }

    /// Read token metadata from a live provider
    pub fn with_reader(mut self, provider: Arc<Provider<Http>>) -> Self {
        self.reader = Some(provider);
        self
    }
}

#[async_trait]
impl ChainClient for DryRunChain {
    fn address(&self) -> Address {
        self.address
    }

    async fn native_balance(&self) -> Result<Decimal> {
        Ok(self.balance)
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self.block.load(Ordering::Relaxed))
    }

    async fn token_decimals(&self, token: Address) -> VenueResult<u32> {
        if let Some(decimals) = self.decimals.get(&token) {
            return Ok(*decimals);
        }
        match &self.reader {
            Some(provider) => PermitToken::new(token, Arc::clone(provider))
                .decimals()
                .call()
                .await
                .map(u32::from)
                .map_err(|e| VenueError::QuoteUnavailable(format!("decimals of {:?}: {}", token, e))),
            None => Ok(NATIVE_DECIMALS),
        }
    }

    async fn sign_permit(
        &self,
        _token: Address,
        spender: Address,
        value: U256,
        deadline: U256,
    ) -> VenueResult<PermitSignature> {
        Ok(PermitSignature {
            owner: self.address,
            spender,
            value,
            deadline,
            v: 27,
            r: [0u8; 32],
            s: [0u8; 32],
        })
    }

    async fn approve(&self, token: Address, spender: Address, value: U256) -> VenueResult<()> {
        info!(token = ?token, spender = ?spender, value = %value, "[DRY RUN] approve");
        Ok(())
    }

    async fn send(&self, tx: &SwapTx) -> VenueResult<H256> {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut seed = tx.data.to_vec();
        seed.extend_from_slice(&n.to_be_bytes());
        let hash = H256::from(keccak256(seed));
        self.block.fetch_add(1, Ordering::Relaxed);
        info!(to = ?tx.to, value = %tx.value, tx_hash = ?hash, "[DRY RUN] transaction not broadcast");
        Ok(hash)
    }

    async fn receipt(&self, tx_hash: H256) -> VenueResult<Option<TxReceipt>> {
        Ok(Some(TxReceipt {
            tx_hash,
            success: true,
            gas_used: None,
            block_number: Some(self.block.load(Ordering::Relaxed)),
            logs: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Bytes;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_hashes_are_unique_and_receipts_succeed() {
        let chain = DryRunChain::new(Address::repeat_byte(1), dec!(25));
        let tx = SwapTx {
            to: Address::repeat_byte(2),
            data: Bytes::from(vec![1, 2, 3]),
            value: U256::zero(),
            gas: None,
        };
        let a = chain.send(&tx).await.unwrap();
        let b = chain.send(&tx).await.unwrap();
        assert_ne!(a, b);
        assert!(chain.receipt(a).await.unwrap().unwrap().success);
        assert_eq!(chain.native_balance().await.unwrap(), dec!(25));
    }

    #[tokio::test]
    async fn test_decimal_overrides_win_over_default() {
        let usdc = Address::repeat_byte(6);
        let chain = DryRunChain::new(Address::repeat_byte(1), dec!(1)).with_token_decimals(usdc, 6);
        assert_eq!(chain.token_decimals(usdc).await.unwrap(), 6);
        assert_eq!(chain.token_decimals(Address::repeat_byte(7)).await.unwrap(), 18);
    }
}
