//! Post-trade settlement and ledger
//!
//! PnL valuation, rolling metrics, weighted-average cost basis and pro-rata
//! delegator distribution, committed atomically through [`LedgerStore`].

pub mod cost_basis;
pub mod distribution;
pub mod ledger;
pub mod metrics;
pub mod outbox;
pub mod pnl;
pub mod service;

pub use ledger::{AgentMetricsUpdate, DelegationCredit, LedgerStore, SettlementBatch};
#[cfg(test)]
pub use ledger::MockLedgerStore;
pub use outbox::{Outbox, OutboxConfig, SideEffect, SideEffectSink};
pub use pnl::{PnlCalculator, PriceSource, TradeLegs};
pub use service::{SettlementConfig, SettlementService};
