use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

use crate::adapters::HttpEndpoint;
use crate::domain::{LONG_TIMEFRAME, MEDIUM_TIMEFRAME, SHORT_TIMEFRAME};
use crate::execution::{RouterConfig, MAX_EXECUTION_ATTEMPTS, MAX_SLIPPAGE_CEILING_BPS};
use crate::risk::RiskSettings;
use crate::settlement::{OutboxConfig, SettlementConfig};
use crate::strategy::StrategySettings;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub enhancer: EnhancerConfig,
    #[serde(default)]
    pub venues: VenuesConfig,
    #[serde(default)]
    pub execution: RouterConfig,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub settlement: SettlementSection,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Symbol of the native asset, used as its price-source key
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
}

fn default_chain_id() -> u64 {
    10143
}

fn default_native_symbol() -> String {
    "MON".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Unset selects the in-memory ledger in dry runs.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    /// Ordered provider list, first success wins
    #[serde(default)]
    pub providers: Vec<HttpEndpoint>,
    /// Token addresses evaluated each cycle
    #[serde(default)]
    pub watchlist: Vec<String>,
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<String>,
    #[serde(default = "default_snapshot_concurrency")]
    pub max_concurrency: usize,
}

fn default_timeframes() -> Vec<String> {
    [SHORT_TIMEFRAME, MEDIUM_TIMEFRAME, LONG_TIMEFRAME]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_snapshot_concurrency() -> usize {
    8
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            watchlist: Vec::new(),
            timeframes: default_timeframes(),
            max_concurrency: default_snapshot_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PricingConfig {
    #[serde(default)]
    pub providers: Vec<HttpEndpoint>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnhancerConfig {
    /// Empty disables enhancement
    #[serde(default)]
    pub providers: Vec<HttpEndpoint>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct VenuesConfig {
    /// Launch platform lens contract; enables the bonding-curve venue and curve reads
    #[serde(default)]
    pub curve_lens: Option<String>,
    #[serde(default)]
    pub aggregator: Option<HttpEndpoint>,
    #[serde(default)]
    pub solver: Option<HttpEndpoint>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SettlementSection {
    #[serde(flatten)]
    pub service: SettlementConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    /// Side-effect endpoint; unset logs side effects instead
    #[serde(default)]
    pub sink: Option<HttpEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_max_concurrent_agents() -> usize {
    4
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_concurrent_agents: default_max_concurrent_agents(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunConfig {
    /// Never broadcast transactions
    #[serde(default)]
    pub enabled: bool,
    /// Wallet address reported when no signing key is configured
    #[serde(default)]
    pub wallet_address: Option<String>,
    /// Native balance reported by the dry-run chain
    #[serde(default = "default_dry_run_balance")]
    pub balance: Decimal,
}

fn default_dry_run_balance() -> Decimal {
    dec!(100)
}

impl Default for DryRunConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            wallet_address: None,
            balance: default_dry_run_balance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("chain.rpc_url", "http://127.0.0.1:8545")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific file, e.g. config/production.toml
            .add_source(
                File::from(config_dir.join(
                    std::env::var("AGENTFLOW_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // AGENTFLOW__CHAIN__RPC_URL, AGENTFLOW__DRY_RUN__ENABLED, ...
            .add_source(
                Environment::with_prefix("AGENTFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.market_data.watchlist.is_empty() {
            errors.push("market_data.watchlist must list at least one token".to_string());
        }
        if self.market_data.providers.is_empty() {
            errors.push("market_data.providers must not be empty".to_string());
        }
        if self.venues.curve_lens.is_none() {
            errors.push("venues.curve_lens is required for curve state reads".to_string());
        }
        if self.venues.aggregator.is_none() && self.venues.solver.is_none() {
            errors.push("configure at least one of venues.aggregator or venues.solver".to_string());
        }
        if self.execution.max_attempts == 0 || self.execution.max_attempts > MAX_EXECUTION_ATTEMPTS {
            errors.push(format!(
                "execution.max_attempts must be between 1 and {}",
                MAX_EXECUTION_ATTEMPTS
            ));
        }
        if self.execution.slippage_ceiling_bps > MAX_SLIPPAGE_CEILING_BPS {
            errors.push(format!(
                "execution.slippage_ceiling_bps must not exceed {}",
                MAX_SLIPPAGE_CEILING_BPS
            ));
        }
        if self.settlement.service.performance_fee_bps > 10_000 {
            errors.push("settlement.performance_fee_bps must not exceed 10000".to_string());
        }
        if self.risk.max_buy_capital_fraction <= Decimal::ZERO
            || self.risk.max_buy_capital_fraction > Decimal::ONE
        {
            errors.push("risk.max_buy_capital_fraction must be in (0, 1]".to_string());
        }
        if !self.dry_run.enabled && self.database.url.is_none() {
            errors.push("database.url is required outside dry-run mode".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
