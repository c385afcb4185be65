//! Trade execution across venues

pub mod chain;
pub mod router;
pub mod units;
pub mod venue;

pub use chain::{ChainClient, TxReceipt};
pub use router::{
    escalate_slippage, ExecutionRouter, RouterConfig, MAX_EXECUTION_ATTEMPTS, MAX_SLIPPAGE_CEILING_BPS,
};
pub use venue::{QuoteRequest, SpendAuthorization, SwapTx, VenueClient, VenueQuote, VenueResult};
