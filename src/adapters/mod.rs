pub mod aggregator;
pub mod bonding_curve;
pub mod contracts;
pub mod curve_reader;
pub mod dry_run;
pub mod enhancer_api;
pub mod ethers_chain;
pub mod http;
pub mod market_api;
pub mod memory;
pub mod postgres;
pub mod price_api;
pub mod sinks;
pub mod solver;

pub use aggregator::AggregatorVenue;
pub use bonding_curve::BondingCurveVenue;
pub use curve_reader::OnChainCurveReader;
pub use dry_run::DryRunChain;
pub use enhancer_api::HttpSignalEnhancer;
pub use ethers_chain::EthersChain;
pub use http::HttpEndpoint;
pub use market_api::HttpMarketData;
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use price_api::HttpPriceSource;
pub use sinks::{HttpSideEffectSink, TracingSink};
pub use solver::SolverVenue;
