//! Wiring of concrete adapters into a [`Pipeline`]

use std::sync::Arc;

use ethers::providers::{Http, Provider as RpcProvider};
use ethers::types::Address;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::{
    AggregatorVenue, BondingCurveVenue, DryRunChain, EthersChain, HttpMarketData,
    HttpPriceSource, HttpSideEffectSink, HttpSignalEnhancer, InMemoryLedger, OnChainCurveReader,
    PostgresLedger, SolverVenue, TracingSink,
};
use crate::config::AppConfig;
use crate::engine::{Pipeline, PipelineComponents};
use crate::enhancer::{EnhancerChain, SignalEnhancer};
use crate::error::{AgentflowError, Result};
use crate::execution::{ChainClient, ExecutionRouter, VenueClient};
use crate::market::{MarketDataProvider, SnapshotBuilder};
use crate::risk::RiskGuard;
use crate::settlement::{
    LedgerStore, Outbox, PnlCalculator, PriceSource, SettlementService, SideEffectSink,
};
use crate::signing::Wallet;
use crate::strategy::StrategyEngine;

pub struct Runtime {
    pub pipeline: Pipeline,
    pub outbox_worker: JoinHandle<()>,
}

impl Runtime {
    /// Drop the pipeline and wait for queued side effects to be delivered
    pub async fn drain(self) {
        let Runtime {
            pipeline,
            outbox_worker,
        } = self;
        drop(pipeline);
        if let Err(e) = outbox_worker.await {
            warn!(error = %e, "outbox worker ended abnormally");
        }
    }
}

fn parse_address(raw: &str, what: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| AgentflowError::AddressParsing(format!("{} '{}': {}", what, raw, e)))
}

/// Postgres when a URL is configured, in-memory for dry runs without one
pub async fn connect_ledger(config: &AppConfig) -> Result<Arc<dyn LedgerStore>> {
    match &config.database.url {
        Some(url) => {
            let ledger = PostgresLedger::new(url, config.database.max_connections).await?;
            Ok(Arc::new(ledger))
        }
        None if config.dry_run.enabled => {
            warn!("no database configured, using in-memory ledger");
            Ok(Arc::new(InMemoryLedger::new()))
        }
        None => Err(AgentflowError::LedgerUnavailable(
            "database.url is required outside dry-run mode".into(),
        )),
    }
}

fn build_chain(config: &AppConfig, rpc: Arc<RpcProvider<Http>>) -> Result<Arc<dyn ChainClient>> {
    let wallet = Wallet::from_env(config.chain.chain_id);
    if !config.dry_run.enabled {
        return Ok(Arc::new(EthersChain::new(rpc, wallet?)));
    }

    let address = match (&wallet, &config.dry_run.wallet_address) {
        (Ok(w), _) => w.address(),
        (Err(_), Some(raw)) => parse_address(raw, "dry_run.wallet_address")?,
        (Err(_), None) => Address::zero(),
    };
    info!(address = ?address, balance = %config.dry_run.balance, "[DRY RUN] chain client");
    Ok(Arc::new(
        DryRunChain::new(address, config.dry_run.balance).with_reader(rpc),
    ))
}

pub async fn build(config: &AppConfig) -> Result<Runtime> {
    let ledger = connect_ledger(config).await?;

    let rpc = Arc::new(
        RpcProvider::<Http>::try_from(config.chain.rpc_url.as_str())
            .map_err(|e| AgentflowError::Rpc(format!("invalid RPC url: {}", e)))?,
    );
    let chain = build_chain(config, Arc::clone(&rpc))?;

    let lens_raw = config
        .venues
        .curve_lens
        .as_deref()
        .ok_or_else(|| AgentflowError::Validation("venues.curve_lens is not configured".into()))?;
    let lens = parse_address(lens_raw, "venues.curve_lens")?;

    let market_providers = config
        .market_data
        .providers
        .iter()
        .map(|e| HttpMarketData::new(e.clone()).map(|p| Arc::new(p) as Arc<dyn MarketDataProvider>))
        .collect::<Result<Vec<_>>>()?;
    let snapshots = SnapshotBuilder::new(
        market_providers,
        Arc::new(OnChainCurveReader::new(Arc::clone(&rpc), lens)),
        config.market_data.timeframes.clone(),
    )
    .with_max_concurrency(config.market_data.max_concurrency);

    let enhancers = config
        .enhancer
        .providers
        .iter()
        .map(|e| HttpSignalEnhancer::new(e.clone()).map(|p| Arc::new(p) as Arc<dyn SignalEnhancer>))
        .collect::<Result<Vec<_>>>()?;

    let price_sources = config
        .pricing
        .providers
        .iter()
        .map(|e| HttpPriceSource::new(e.clone()).map(|p| Arc::new(p) as Arc<dyn PriceSource>))
        .collect::<Result<Vec<_>>>()?;

    let mut venues: Vec<Arc<dyn VenueClient>> =
        vec![Arc::new(BondingCurveVenue::new(Arc::clone(&rpc), lens))];
    if let Some(endpoint) = &config.venues.aggregator {
        venues.push(Arc::new(AggregatorVenue::new(endpoint.clone())?));
    }
    if let Some(endpoint) = &config.venues.solver {
        venues.push(Arc::new(SolverVenue::new(endpoint.clone())?));
    }

    let sink: Arc<dyn SideEffectSink> = match &config.settlement.sink {
        Some(endpoint) => Arc::new(HttpSideEffectSink::new(endpoint.clone())?),
        None => Arc::new(TracingSink),
    };
    let (outbox, outbox_worker) = Outbox::spawn(config.settlement.outbox.clone(), sink);

    let pipeline = Pipeline::new(PipelineComponents {
        ledger: Arc::clone(&ledger),
        chain: Arc::clone(&chain),
        snapshots,
        strategies: StrategyEngine::new(config.strategy.clone()),
        enhancers: EnhancerChain::new(enhancers),
        guard: RiskGuard::new(Arc::clone(&ledger), config.risk.clone()),
        router: ExecutionRouter::new(venues, chain, config.execution.clone()),
        settlement: SettlementService::new(
            ledger,
            PnlCalculator::new(price_sources),
            outbox,
            config.settlement.service.clone(),
        ),
        watchlist: config.market_data.watchlist.clone(),
    });

    info!(
        dry_run = config.dry_run.enabled,
        watchlist = config.market_data.watchlist.len(),
        "pipeline ready"
    );
    Ok(Runtime {
        pipeline,
        outbox_worker,
    })
}
