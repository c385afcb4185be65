pub mod permit;
pub mod wallet;

pub use permit::{PermitRequest, PermitSignature, PERMIT_TYPEHASH};
pub use wallet::Wallet;
