//! EIP-2612 permit digests
//!
//! The domain separator is read from the token contract rather than rebuilt
//! locally, so tokens with non-standard domain names still verify.

use ethers::abi::Token;
use ethers::types::{Address, Signature, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

use super::Wallet;
use crate::error::Result;

/// keccak256("Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)")
pub const PERMIT_TYPEHASH: [u8; 32] = [
    0x6e, 0x71, 0xed, 0xae, 0x12, 0xb1, 0xb9, 0x7f, 0x4d, 0x1f, 0x60, 0x37, 0x0f, 0xef, 0x10,
    0x10, 0x5f, 0xa2, 0xfa, 0xae, 0x01, 0x26, 0x11, 0x4a, 0x16, 0x9c, 0x64, 0x84, 0x5d, 0x61,
    0x26, 0xc9,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermitRequest {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    pub deadline: U256,
}

/// Signed permit, split into the (v, r, s) form router contracts take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub deadline: U256,
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl PermitRequest {
    pub fn struct_hash(&self) -> [u8; 32] {
        let tokens = vec![
            Token::FixedBytes(PERMIT_TYPEHASH.to_vec()),
            Token::Address(self.owner),
            Token::Address(self.spender),
            Token::Uint(self.value),
            Token::Uint(self.nonce),
            Token::Uint(self.deadline),
        ];
        keccak256(ethers::abi::encode(&tokens))
    }

    /// `keccak256("\x19\x01" || domainSeparator || structHash)`
    pub fn digest(&self, domain_separator: [u8; 32]) -> H256 {
        let mut buf = Vec::with_capacity(66);
        buf.extend_from_slice(&[0x19, 0x01]);
        buf.extend_from_slice(&domain_separator);
        buf.extend_from_slice(&self.struct_hash());
        H256::from(keccak256(buf))
    }

    pub fn sign(&self, wallet: &Wallet, domain_separator: [u8; 32]) -> Result<PermitSignature> {
        let signature = wallet.sign_hash(self.digest(domain_separator))?;
        Ok(self.with_signature(&signature))
    }

    fn with_signature(&self, signature: &Signature) -> PermitSignature {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        signature.r.to_big_endian(&mut r);
        signature.s.to_big_endian(&mut s);
        PermitSignature {
            owner: self.owner,
            spender: self.spender,
            value: self.value,
            deadline: self.deadline,
            v: signature.v as u8,
            r,
            s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn request(owner: Address) -> PermitRequest {
        PermitRequest {
            owner,
            spender: Address::repeat_byte(0x22),
            value: U256::exp10(18),
            nonce: U256::zero(),
            deadline: U256::from(1_900_000_000u64),
        }
    }

    #[test]
    fn test_typehash_matches_permit_signature() {
        let computed = keccak256(
            b"Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)",
        );
        assert_eq!(computed, PERMIT_TYPEHASH);
    }

    #[test]
    fn test_signature_recovers_to_owner() {
        let wallet = Wallet::from_private_key(TEST_KEY, 143).unwrap();
        let req = request(wallet.address());
        let domain = [0x42u8; 32];

        let permit = req.sign(&wallet, domain).unwrap();
        assert!(permit.v == 27 || permit.v == 28);

        let signature = Signature {
            r: U256::from_big_endian(&permit.r),
            s: U256::from_big_endian(&permit.s),
            v: u64::from(permit.v),
        };
        let recovered = signature.recover(req.digest(domain)).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[test]
    fn test_digest_depends_on_domain() {
        let req = request(Address::repeat_byte(0x11));
        assert_ne!(req.digest([0u8; 32]), req.digest([1u8; 32]));
    }
}
