use crate::error::{AgentflowError, Result};
use ethers::signers::{LocalWallet, Signer as EthersSigner};
use ethers::types::{Address, Signature, H256};
use tracing::info;
use zeroize::Zeroize;

/// Trading wallet used for permits and transaction signing
///
/// # Security
/// The private key is only used during wallet creation and then immediately zeroized.
#[derive(Clone)]
pub struct Wallet {
    inner: LocalWallet,
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a private key hex string
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self> {
        let mut secure_key = private_key.trim_start_matches("0x").to_string();

        let parsed = secure_key
            .parse::<LocalWallet>()
            .map_err(|e| AgentflowError::Wallet(format!("Invalid private key: {}", e)));
        secure_key.zeroize();
        let wallet = parsed?.with_chain_id(chain_id);

        info!("Wallet initialized: {:?} (private key zeroized from memory)", wallet.address());

        Ok(Self {
            inner: wallet,
            chain_id,
        })
    }

    /// Create a wallet from `AGENTFLOW_PRIVATE_KEY`, falling back to `PRIVATE_KEY`
    pub fn from_env(chain_id: u64) -> Result<Self> {
        let mut private_key = std::env::var("AGENTFLOW_PRIVATE_KEY")
            .or_else(|_| std::env::var("PRIVATE_KEY"))
            .map_err(|_| {
                AgentflowError::Wallet(
                    "AGENTFLOW_PRIVATE_KEY or PRIVATE_KEY environment variable not set".to_string(),
                )
            })?;

        let result = Self::from_private_key(&private_key, chain_id);
        private_key.zeroize();
        result
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a raw 32-byte digest (no message prefix)
    pub fn sign_hash(&self, hash: H256) -> Result<Signature> {
        self.inner
            .sign_hash(hash)
            .map_err(|e| AgentflowError::Signature(format!("Failed to sign hash: {}", e)))
    }

    /// Underlying ethers wallet for middleware construction
    pub fn inner(&self) -> &LocalWallet {
        &self.inner
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::from_private_key(TEST_KEY, 143).unwrap();
        assert_eq!(wallet.chain_id(), 143);
        assert_eq!(
            format!("{:?}", wallet.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let err = Wallet::from_private_key("0xnothex", 143).unwrap_err();
        assert!(matches!(err, AgentflowError::Wallet(_)));
    }
}
