pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod enhancer;
pub mod error;
pub mod execution;
pub mod logging;
pub mod market;
pub mod providers;
pub mod risk;
pub mod runtime;
pub mod settlement;
pub mod signing;
pub mod strategy;

pub use config::AppConfig;
pub use engine::{CycleOutcome, Pipeline, PipelineComponents};
pub use error::{AgentflowError, Result, VenueError};
pub use signing::Wallet;
