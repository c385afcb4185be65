//! Live chain client: JSON-RPC provider with the trading wallet as signer

use std::sync::Arc;

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers::types::{Address, TransactionRequest, H256, U256, U64};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use super::contracts::PermitToken;
use crate::error::{AgentflowError, Result, VenueError};
use crate::execution::units::{from_base_units, NATIVE_DECIMALS};
use crate::execution::{ChainClient, SwapTx, TxReceipt, VenueResult};
use crate::signing::{PermitRequest, PermitSignature, Wallet};

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EthersChain {
    provider: Arc<Provider<Http>>,
    client: Arc<Client>,
    wallet: Wallet,
}

impl EthersChain {
    pub fn new(provider: Arc<Provider<Http>>, wallet: Wallet) -> Self {
        let client = Arc::new(SignerMiddleware::new(
            provider.as_ref().clone(),
            wallet.inner().clone(),
        ));
        Self {
            provider,
            client,
            wallet,
        }
    }

    pub fn connect(rpc_url: &str, wallet: Wallet) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| AgentflowError::Rpc(format!("invalid RPC url {}: {}", rpc_url, e)))?;
        info!(rpc_url, address = ?wallet.address(), "chain client connected");
        Ok(Self::new(Arc::new(provider), wallet))
    }
}

#[async_trait]
impl ChainClient for EthersChain {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn native_balance(&self) -> Result<Decimal> {
        let raw = self.provider.get_balance(self.wallet.address(), None).await?;
        from_base_units(raw, NATIVE_DECIMALS)
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    async fn token_decimals(&self, token: Address) -> VenueResult<u32> {
        let decimals = PermitToken::new(token, Arc::clone(&self.provider))
            .decimals()
            .call()
            .await
            .map_err(|e| VenueError::QuoteUnavailable(format!("decimals of {:?}: {}", token, e)))?;
        Ok(u32::from(decimals))
    }

    #[instrument(skip(self))]
    async fn sign_permit(
        &self,
        token: Address,
        spender: Address,
        value: U256,
        deadline: U256,
    ) -> VenueResult<PermitSignature> {
        let contract = PermitToken::new(token, Arc::clone(&self.provider));
        let owner = self.wallet.address();
        let nonce = contract
            .nonces(owner)
            .call()
            .await
            .map_err(|e| VenueError::Signing(format!("nonces: {}", e)))?;
        let domain_separator = contract
            .domain_separator()
            .call()
            .await
            .map_err(|e| VenueError::Signing(format!("DOMAIN_SEPARATOR: {}", e)))?;

        PermitRequest {
            owner,
            spender,
            value,
            nonce,
            deadline,
        }
        .sign(&self.wallet, domain_separator)
        .map_err(|e| VenueError::Signing(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn approve(&self, token: Address, spender: Address, value: U256) -> VenueResult<()> {
        let contract = PermitToken::new(token, Arc::clone(&self.client));
        let allowance = contract
            .allowance(self.wallet.address(), spender)
            .call()
            .await
            .map_err(|e| VenueError::Submission(format!("allowance: {}", e)))?;
        if allowance >= value {
            debug!("allowance already sufficient");
            return Ok(());
        }

        let call = contract.approve(spender, value);
        let pending = call
            .send()
            .await
            .map_err(|e| VenueError::Submission(format!("approve: {}", e)))?;
        let tx_hash = pending.tx_hash();
        let receipt = pending
            .await
            .map_err(|e| VenueError::Confirmation(format!("approve: {}", e)))?
            .ok_or_else(|| VenueError::Confirmation("approve dropped from mempool".into()))?;
        if receipt.status != Some(U64::from(1)) {
            return Err(VenueError::Reverted {
                tx_hash: format!("{:?}", tx_hash),
            });
        }
        debug!(tx_hash = ?tx_hash, "approval mined");
        Ok(())
    }

    async fn send(&self, tx: &SwapTx) -> VenueResult<H256> {
        let mut request = TransactionRequest::new()
            .from(self.wallet.address())
            .to(tx.to)
            .data(tx.data.clone())
            .value(tx.value);
        if let Some(gas) = tx.gas {
            request = request.gas(gas);
        }
        let pending = self
            .client
            .send_transaction(request, None)
            .await
            .map_err(|e| VenueError::Submission(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: H256) -> VenueResult<Option<TxReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| VenueError::Confirmation(e.to_string()))?;
        Ok(receipt.map(|r| TxReceipt {
            tx_hash,
            success: r.status == Some(U64::from(1)),
            gas_used: r.gas_used,
            block_number: r.block_number.map(|b| b.as_u64()),
            logs: r.logs,
        }))
    }
}
