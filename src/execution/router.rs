//! Multi-venue execution router
//!
//! One venue is selected per trade and used for every attempt. Each attempt runs
//! quote, build, sign, submit and confirm. Retryable failures get exactly one more
//! attempt at escalated slippage; quote validation failures end the trade.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use ethers::types::{Address, Log, H256, U256};
use ethers::utils::keccak256;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, instrument, warn};

use crate::domain::{MarketSnapshot, RouteFill, TradeAction, TradeSignal, Venue};
use crate::error::{AgentflowError, Result, VenueError};

use super::chain::{ChainClient, TxReceipt};
use super::units::{from_base_units, to_base_units, NATIVE_DECIMALS};
use super::venue::{QuoteRequest, SpendAuthorization, SwapTx, VenueClient, VenueQuote, VenueResult};

/// Hard cap on attempts per trade, whatever the configuration says
pub const MAX_EXECUTION_ATTEMPTS: u8 = 2;
/// Hard cap on escalated slippage
pub const MAX_SLIPPAGE_CEILING_BPS: u32 = 2_000;

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// Overrides `confirmation_timeout_secs` when set
    #[serde(default)]
    pub confirmation_timeout_ms: Option<u64>,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_slippage_ceiling_bps")]
    pub slippage_ceiling_bps: u32,
    #[serde(default = "default_permit_deadline_secs")]
    pub permit_deadline_secs: u64,
}

fn default_max_attempts() -> u8 {
    2
}

fn default_confirmation_timeout_secs() -> u64 {
    60
}

fn default_receipt_poll_ms() -> u64 {
    1_000
}

fn default_slippage_ceiling_bps() -> u32 {
    2_000
}

fn default_permit_deadline_secs() -> u64 {
    1_200
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            confirmation_timeout_ms: None,
            receipt_poll_ms: default_receipt_poll_ms(),
            slippage_ceiling_bps: default_slippage_ceiling_bps(),
            permit_deadline_secs: default_permit_deadline_secs(),
        }
    }
}

impl RouterConfig {
    fn confirmation_timeout(&self) -> Duration {
        match self.confirmation_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.confirmation_timeout_secs),
        }
    }
}

/// Slippage for a retry: `min(original * 1.5, ceiling)`
pub fn escalate_slippage(original_bps: u32, ceiling_bps: u32) -> u32 {
    (original_bps.saturating_mul(3) / 2).min(ceiling_bps)
}

/// Base-unit scale of each side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LegDecimals {
    input: u32,
    output: u32,
}

impl LegDecimals {
    fn for_action(action: TradeAction, token_decimals: u32) -> Self {
        match action {
            TradeAction::Buy => Self {
                input: NATIVE_DECIMALS,
                output: token_decimals,
            },
            TradeAction::Sell => Self {
                input: token_decimals,
                output: NATIVE_DECIMALS,
            },
        }
    }
}

fn transfer_topic() -> H256 {
    H256::from(keccak256("Transfer(address,address,uint256)"))
}

/// Total ERC-20 `token` transferred to `recipient` in `logs`, if any transfer matched
pub fn received_amount(logs: &[Log], token: Address, recipient: Address) -> Option<U256> {
    let topic = transfer_topic();
    let to = H256::from(recipient);
    logs.iter()
        .filter(|log| log.address == token)
        .filter(|log| log.topics.len() == 3 && log.topics[0] == topic && log.topics[2] == to)
        .filter(|log| log.data.len() == 32)
        .map(|log| U256::from_big_endian(log.data.as_ref()))
        .fold(None, |total: Option<U256>, amount| {
            Some(total.unwrap_or_default().saturating_add(amount))
        })
}

struct AttemptOutcome {
    receipt: TxReceipt,
    amount_in: Decimal,
    quoted_out: Decimal,
    used_permit: bool,
}

pub struct ExecutionRouter {
    venues: Vec<Arc<dyn VenueClient>>,
    chain: Arc<dyn ChainClient>,
    config: RouterConfig,
    decimals: DashMap<Address, u32>,
}

impl ExecutionRouter {
    pub fn new(venues: Vec<Arc<dyn VenueClient>>, chain: Arc<dyn ChainClient>, config: RouterConfig) -> Self {
        Self {
            venues,
            chain,
            config,
            decimals: DashMap::new(),
        }
    }

    fn venue(&self, venue: Venue) -> Option<&Arc<dyn VenueClient>> {
        self.venues.iter().find(|v| v.venue() == venue)
    }

    /// Token decimals, read from the chain once per token
    async fn token_decimals(&self, token: Address) -> VenueResult<u32> {
        if let Some(known) = self.decimals.get(&token) {
            return Ok(*known);
        }
        let decimals = self.chain.token_decimals(token).await?;
        self.decimals.insert(token, decimals);
        Ok(decimals)
    }

    /// Pick the venue for `token`: preference, then the curve while the token is
    /// on it, then the first of aggregator and solver that lists it
    pub async fn select_venue(
        &self,
        token: Address,
        market: Option<&MarketSnapshot>,
        preference: Option<Venue>,
    ) -> Option<Arc<dyn VenueClient>> {
        if let Some(preferred) = preference {
            if let Some(client) = self.venue(preferred) {
                return Some(Arc::clone(client));
            }
            warn!(venue = %preferred, "preferred venue not configured, selecting automatically");
        }

        let on_curve = market.map(|m| !m.is_graduated).unwrap_or(false);
        let mut candidates = Vec::with_capacity(3);
        if on_curve {
            candidates.push(Venue::BondingCurve);
        }
        candidates.extend([Venue::Aggregator, Venue::Solver]);

        for candidate in candidates {
            let Some(client) = self.venue(candidate) else {
                continue;
            };
            match client.lists(token).await {
                Ok(true) => return Some(Arc::clone(client)),
                Ok(false) => debug!(venue = %candidate, token = ?token, "venue does not list token"),
                Err(e) => warn!(venue = %candidate, error = %e, "listing check failed"),
            }
        }
        None
    }

    #[instrument(skip_all, fields(token = %signal.token_symbol, action = %signal.action))]
    pub async fn route(
        &self,
        signal: &TradeSignal,
        market: Option<&MarketSnapshot>,
        slippage_bps: u32,
        preference: Option<Venue>,
    ) -> Result<RouteFill> {
        let token: Address = signal
            .token_address
            .parse()
            .map_err(|e| AgentflowError::AddressParsing(format!("{}: {}", signal.token_address, e)))?;
        let token_decimals = self.token_decimals(token).await?;
        let legs = LegDecimals::for_action(signal.action, token_decimals);
        let amount_in = to_base_units(signal.amount, legs.input)?;

        let venue = self
            .select_venue(token, market, preference)
            .await
            .ok_or_else(|| AgentflowError::NoVenue {
                token: signal.token_address.clone(),
            })?;

        let request = QuoteRequest {
            token,
            action: signal.action,
            amount_in,
            recipient: self.chain.address(),
        };

        let max_attempts = self.config.max_attempts.clamp(1, MAX_EXECUTION_ATTEMPTS);
        let ceiling = self.config.slippage_ceiling_bps.min(MAX_SLIPPAGE_CEILING_BPS);
        let mut last_err = None;
        for attempt in 1..=max_attempts {
            let slippage = if attempt == 1 {
                slippage_bps
            } else {
                escalate_slippage(slippage_bps, ceiling)
            };

            match self.attempt(venue.as_ref(), &request, legs, slippage).await {
                Ok(outcome) => {
                    let fill = RouteFill {
                        tx_hash: format!("{:?}", outcome.receipt.tx_hash),
                        venue: venue.venue(),
                        amount_in: outcome.amount_in,
                        amount_out: self.settled_output(&request, &outcome, legs),
                        gas_used: outcome.receipt.gas_used.map(|g| g.low_u64()),
                        attempts: attempt,
                        slippage_bps: slippage,
                        used_permit: outcome.used_permit,
                    };
                    info!(
                        venue = %fill.venue,
                        tx_hash = %fill.tx_hash,
                        attempt,
                        slippage_bps = slippage,
                        "trade confirmed"
                    );
                    return Ok(fill);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(venue = %venue.venue(), attempt, error = %e, "attempt failed, retrying with escalated slippage");
                    last_err = Some(e);
                }
                Err(e) => {
                    warn!(venue = %venue.venue(), attempt, error = %e, "attempt failed");
                    last_err = Some(e);
                    break;
                }
            }
        }

        Err(last_err
            .map(AgentflowError::Execution)
            .unwrap_or_else(|| AgentflowError::Internal("no execution attempt made".into())))
    }

    /// Token received according to the receipt on buys, the quote otherwise
    fn settled_output(&self, request: &QuoteRequest, outcome: &AttemptOutcome, legs: LegDecimals) -> Decimal {
        if request.action != TradeAction::Buy {
            return outcome.quoted_out;
        }
        let Some(raw) = received_amount(&outcome.receipt.logs, request.token, request.recipient) else {
            return outcome.quoted_out;
        };
        match from_base_units(raw, legs.output) {
            Ok(received) => received,
            Err(e) => {
                warn!(raw = %raw, error = %e, "received amount not representable, keeping quoted output");
                outcome.quoted_out
            }
        }
    }

    async fn attempt(
        &self,
        venue: &dyn VenueClient,
        request: &QuoteRequest,
        legs: LegDecimals,
        slippage_bps: u32,
    ) -> VenueResult<AttemptOutcome> {
        let quote = venue.quote(request).await?;
        quote.validate()?;
        let amount_in = from_base_units(quote.amount_in, legs.input)
            .map_err(|e| VenueError::QuoteInvalid(format!("input amount: {}", e)))?;
        let quoted_out = from_base_units(quote.expected_out, legs.output)
            .map_err(|e| VenueError::QuoteInvalid(format!("expected output: {}", e)))?;
        debug!(
            venue = %quote.venue,
            amount_in = %quote.amount_in,
            expected_out = %quote.expected_out,
            slippage_bps,
            "quote received"
        );

        let (tx_hash, used_permit) = match request.action {
            TradeAction::Buy => {
                let tx = venue.build(&quote, slippage_bps, &SpendAuthorization::Native).await?;
                (self.chain.send(&tx).await?, false)
            }
            TradeAction::Sell => self.submit_sell(venue, &quote, slippage_bps).await?,
        };

        let receipt = self.await_confirmation(tx_hash).await?;
        Ok(AttemptOutcome {
            receipt,
            amount_in,
            quoted_out,
            used_permit,
        })
    }

    /// Permit-bundled swap, falling back to approve-then-swap in the same attempt
    async fn submit_sell(
        &self,
        venue: &dyn VenueClient,
        quote: &VenueQuote,
        slippage_bps: u32,
    ) -> VenueResult<(H256, bool)> {
        let Some(spender) = quote.spender else {
            let tx = venue.build(quote, slippage_bps, &SpendAuthorization::Approved).await?;
            return Ok((self.chain.send(&tx).await?, false));
        };

        match self.submit_with_permit(venue, quote, spender, slippage_bps).await {
            Ok(hash) => return Ok((hash, true)),
            Err(e @ VenueError::QuoteInvalid(_)) => return Err(e),
            Err(e) => {
                debug!(venue = %quote.venue, error = %e, "permit path unavailable, approving");
            }
        }

        self.chain.approve(quote.token, spender, quote.amount_in).await?;
        let tx = venue.build(quote, slippage_bps, &SpendAuthorization::Approved).await?;
        Ok((self.chain.send(&tx).await?, false))
    }

    async fn submit_with_permit(
        &self,
        venue: &dyn VenueClient,
        quote: &VenueQuote,
        spender: Address,
        slippage_bps: u32,
    ) -> VenueResult<H256> {
        let deadline = U256::from(Utc::now().timestamp().max(0) as u64 + self.config.permit_deadline_secs);
        let permit = self
            .chain
            .sign_permit(quote.token, spender, quote.amount_in, deadline)
            .await?;
        let tx: SwapTx = venue
            .build(quote, slippage_bps, &SpendAuthorization::Permit(permit))
            .await?;
        self.chain.send(&tx).await
    }

    async fn await_confirmation(&self, tx_hash: H256) -> VenueResult<TxReceipt> {
        let limit = self.config.confirmation_timeout();
        let poll = Duration::from_millis(self.config.receipt_poll_ms.max(1));
        let started = Instant::now();

        let polled = timeout(limit, async {
            loop {
                match self.chain.receipt(tx_hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => {}
                    Err(e) => debug!(tx_hash = ?tx_hash, error = %e, "receipt lookup failed, polling again"),
                }
                sleep(poll).await;
            }
        })
        .await;

        let receipt = match polled {
            Ok(result) => result?,
            Err(_) => {
                return Err(VenueError::ConfirmationTimeout {
                    tx_hash: format!("{:?}", tx_hash),
                    elapsed_secs: started.elapsed().as_secs(),
                })
            }
        };

        if !receipt.success {
            return Err(VenueError::Reverted {
                tx_hash: format!("{:?}", tx_hash),
            });
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SignalDiagnostics, StrategyKind};
    use crate::signing::PermitSignature;
    use async_trait::async_trait;
    use ethers::types::Bytes;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const TOKEN: &str = "0x1111111111111111111111111111111111111111";

    struct FakeVenue {
        venue: Venue,
        listed: bool,
        zero_quote: bool,
        fixed_out: Option<U256>,
        permit: bool,
        quotes: Mutex<u32>,
        built: Mutex<Vec<(u32, SpendAuthorization)>>,
    }

    impl FakeVenue {
        fn new(venue: Venue) -> Self {
            Self {
                venue,
                listed: true,
                zero_quote: false,
                fixed_out: None,
                permit: true,
                quotes: Mutex::new(0),
                built: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VenueClient for FakeVenue {
        fn venue(&self) -> Venue {
            self.venue
        }

        async fn lists(&self, _token: Address) -> VenueResult<bool> {
            Ok(self.listed)
        }

        async fn quote(&self, request: &QuoteRequest) -> VenueResult<VenueQuote> {
            *self.quotes.lock().unwrap() += 1;
            Ok(VenueQuote {
                venue: self.venue,
                token: request.token,
                action: request.action,
                amount_in: request.amount_in,
                expected_out: match (self.zero_quote, self.fixed_out) {
                    (true, _) => U256::zero(),
                    (false, Some(out)) => out,
                    (false, None) => request.amount_in * 2,
                },
                spender: Some(Address::repeat_byte(0x99)),
                meta: serde_json::Value::Null,
            })
        }

        async fn build(
            &self,
            _quote: &VenueQuote,
            slippage_bps: u32,
            authorization: &SpendAuthorization,
        ) -> VenueResult<SwapTx> {
            if matches!(authorization, SpendAuthorization::Permit(_)) && !self.permit {
                return Err(VenueError::PermitUnsupported);
            }
            self.built
                .lock()
                .unwrap()
                .push((slippage_bps, authorization.clone()));
            Ok(SwapTx {
                to: Address::repeat_byte(0x99),
                data: Bytes::default(),
                value: U256::zero(),
                gas: None,
            })
        }
    }

    /// Receipts are handed out in order; `None` entries mean "never mined"
    struct FakeChain {
        outcomes: Mutex<VecDeque<Option<bool>>>,
        sent: Mutex<Vec<H256>>,
        approvals: Mutex<u32>,
        permit_fails: bool,
        decimals: u32,
        decimals_reads: Mutex<u32>,
        logs: Vec<Log>,
    }

    impl FakeChain {
        fn new(outcomes: Vec<Option<bool>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                sent: Mutex::new(Vec::new()),
                approvals: Mutex::new(0),
                permit_fails: false,
                decimals: 18,
                decimals_reads: Mutex::new(0),
                logs: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        fn address(&self) -> Address {
            Address::repeat_byte(0x01)
        }

        async fn native_balance(&self) -> Result<Decimal> {
            Ok(dec!(100))
        }

        async fn latest_block(&self) -> Result<u64> {
            Ok(1)
        }

        async fn token_decimals(&self, _token: Address) -> VenueResult<u32> {
            *self.decimals_reads.lock().unwrap() += 1;
            Ok(self.decimals)
        }

        async fn sign_permit(
            &self,
            _token: Address,
            spender: Address,
            value: U256,
            deadline: U256,
        ) -> VenueResult<PermitSignature> {
            if self.permit_fails {
                return Err(VenueError::Signing("token has no permit".into()));
            }
            Ok(PermitSignature {
                owner: self.address(),
                spender,
                value,
                deadline,
                v: 27,
                r: [1; 32],
                s: [2; 32],
            })
        }

        async fn approve(&self, _token: Address, _spender: Address, _value: U256) -> VenueResult<()> {
            *self.approvals.lock().unwrap() += 1;
            Ok(())
        }

        async fn send(&self, _tx: &SwapTx) -> VenueResult<H256> {
            let mut sent = self.sent.lock().unwrap();
            let hash = H256::from_low_u64_be(sent.len() as u64 + 1);
            sent.push(hash);
            Ok(hash)
        }

        async fn receipt(&self, tx_hash: H256) -> VenueResult<Option<TxReceipt>> {
            let index = tx_hash.to_low_u64_be() as usize - 1;
            let outcome = self.outcomes.lock().unwrap().get(index).copied().flatten();
            Ok(outcome.map(|success| TxReceipt {
                tx_hash,
                success,
                gas_used: Some(U256::from(120_000)),
                block_number: Some(10),
                logs: self.logs.clone(),
            }))
        }
    }

    fn signal(action: TradeAction) -> TradeSignal {
        TradeSignal::new(
            action,
            TOKEN,
            "TKN",
            dec!(1.5),
            80.0,
            "test",
            StrategyKind::Momentum,
            SignalDiagnostics::Dca {
                discount_pct: 0.0,
                candidates: 1,
            },
        )
    }

    fn fast_config() -> RouterConfig {
        RouterConfig {
            confirmation_timeout_ms: Some(50),
            receipt_poll_ms: 5,
            ..RouterConfig::default()
        }
    }

    fn router(venue: Arc<FakeVenue>, chain: Arc<FakeChain>) -> ExecutionRouter {
        ExecutionRouter::new(vec![venue], chain, fast_config())
    }

    #[test]
    fn test_slippage_escalation_is_capped() {
        assert_eq!(escalate_slippage(100, 2000), 150);
        assert_eq!(escalate_slippage(1500, 2000), 2000);
    }

    #[tokio::test]
    async fn test_revert_then_success_uses_second_attempt() {
        let venue = Arc::new(FakeVenue::new(Venue::Aggregator));
        let chain = Arc::new(FakeChain::new(vec![Some(false), Some(true)]));
        let fill = router(venue.clone(), chain.clone())
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap();

        assert_eq!(fill.attempts, 2);
        assert_eq!(fill.slippage_bps, 150);
        assert_eq!(fill.tx_hash, format!("{:?}", H256::from_low_u64_be(2)));
        assert_eq!(fill.amount_in, dec!(1.5));
        assert_eq!(fill.amount_out, dec!(3));
        assert_eq!(fill.gas_used, Some(120_000));
        assert_eq!(chain.sent.lock().unwrap().len(), 2);
        let slippages: Vec<u32> = venue.built.lock().unwrap().iter().map(|(s, _)| *s).collect();
        assert_eq!(slippages, vec![100, 150]);
    }

    #[tokio::test]
    async fn test_never_more_than_two_attempts() {
        let venue = Arc::new(FakeVenue::new(Venue::Aggregator));
        let chain = Arc::new(FakeChain::new(vec![Some(false), Some(false), Some(true)]));
        let err = router(venue.clone(), chain.clone())
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentflowError::Execution(VenueError::Reverted { .. })));
        assert_eq!(chain.sent.lock().unwrap().len(), 2);
        assert_eq!(*venue.quotes.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_quote_is_not_retried() {
        let mut fake = FakeVenue::new(Venue::Aggregator);
        fake.zero_quote = true;
        let venue = Arc::new(fake);
        let chain = Arc::new(FakeChain::new(vec![]));
        let err = router(venue.clone(), chain.clone())
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentflowError::Execution(VenueError::QuoteInvalid(_))));
        assert_eq!(*venue.quotes.lock().unwrap(), 1);
        assert!(chain.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_timeout_is_retryable() {
        let venue = Arc::new(FakeVenue::new(Venue::Aggregator));
        let chain = Arc::new(FakeChain::new(vec![None, Some(true)]));
        let fill = router(venue, chain)
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap();
        assert_eq!(fill.attempts, 2);
    }

    #[tokio::test]
    async fn test_sell_prefers_permit() {
        let venue = Arc::new(FakeVenue::new(Venue::Solver));
        let chain = Arc::new(FakeChain::new(vec![Some(true)]));
        let fill = router(venue.clone(), chain.clone())
            .route(&signal(TradeAction::Sell), None, 100, None)
            .await
            .unwrap();

        assert!(fill.used_permit);
        assert_eq!(*chain.approvals.lock().unwrap(), 0);
        assert!(matches!(
            venue.built.lock().unwrap()[0].1,
            SpendAuthorization::Permit(_)
        ));
    }

    #[tokio::test]
    async fn test_permit_failure_falls_back_to_approve_in_same_attempt() {
        let mut fake = FakeVenue::new(Venue::Aggregator);
        fake.permit = false;
        let venue = Arc::new(fake);
        let chain = Arc::new(FakeChain::new(vec![Some(true)]));
        let fill = router(venue.clone(), chain.clone())
            .route(&signal(TradeAction::Sell), None, 100, None)
            .await
            .unwrap();

        assert!(!fill.used_permit);
        assert_eq!(fill.attempts, 1);
        assert_eq!(*chain.approvals.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_permit_signing_failure_falls_back() {
        let venue = Arc::new(FakeVenue::new(Venue::Aggregator));
        let mut fake_chain = FakeChain::new(vec![Some(true)]);
        fake_chain.permit_fails = true;
        let chain = Arc::new(fake_chain);
        let fill = router(venue, chain.clone())
            .route(&signal(TradeAction::Sell), None, 100, None)
            .await
            .unwrap();
        assert!(!fill.used_permit);
        assert_eq!(*chain.approvals.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_venue_selection_order() {
        let curve = Arc::new(FakeVenue::new(Venue::BondingCurve));
        let mut unlisted = FakeVenue::new(Venue::Aggregator);
        unlisted.listed = false;
        let aggregator = Arc::new(unlisted);
        let solver = Arc::new(FakeVenue::new(Venue::Solver));
        let chain = Arc::new(FakeChain::new(vec![]));
        let router = ExecutionRouter::new(
            vec![curve, aggregator, solver],
            chain,
            fast_config(),
        );
        let token: Address = TOKEN.parse().unwrap();

        let mut market = crate::strategy::test_support::snapshot(TOKEN, None, None, None);
        let chosen = router.select_venue(token, Some(&market), None).await.unwrap();
        assert_eq!(chosen.venue(), Venue::BondingCurve);

        market.is_graduated = true;
        let chosen = router.select_venue(token, Some(&market), None).await.unwrap();
        assert_eq!(chosen.venue(), Venue::Solver);

        let chosen = router
            .select_venue(token, Some(&market), Some(Venue::Aggregator))
            .await
            .unwrap();
        assert_eq!(chosen.venue(), Venue::Aggregator);
    }

    #[tokio::test]
    async fn test_no_venue_is_an_error() {
        let mut unlisted = FakeVenue::new(Venue::Aggregator);
        unlisted.listed = false;
        let chain = Arc::new(FakeChain::new(vec![]));
        let err = router(Arc::new(unlisted), chain)
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentflowError::NoVenue { .. }));
    }

    fn transfer(token: Address, to: Address, amount: U256) -> Log {
        let mut data = [0u8; 32];
        amount.to_big_endian(&mut data);
        Log {
            address: token,
            topics: vec![transfer_topic(), H256::from(Address::repeat_byte(0x99)), H256::from(to)],
            data: Bytes::from(data.to_vec()),
            ..Log::default()
        }
    }

    #[tokio::test]
    async fn test_buy_output_uses_token_decimals() {
        let mut fake = FakeVenue::new(Venue::Aggregator);
        fake.fixed_out = Some(U256::from(3_000_000u64));
        let mut fake_chain = FakeChain::new(vec![Some(true), Some(true)]);
        fake_chain.decimals = 6;
        let chain = Arc::new(fake_chain);
        let router = router(Arc::new(fake), chain.clone());

        let fill = router
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap();
        assert_eq!(fill.amount_in, dec!(1.5));
        assert_eq!(fill.amount_out, dec!(3));

        router
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap();
        assert_eq!(*chain.decimals_reads.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sell_input_uses_token_decimals() {
        let venue = Arc::new(FakeVenue::new(Venue::Aggregator));
        let mut fake_chain = FakeChain::new(vec![Some(true)]);
        fake_chain.decimals = 6;
        let chain = Arc::new(fake_chain);
        let fill = router(venue, chain)
            .route(&signal(TradeAction::Sell), None, 100, None)
            .await
            .unwrap();
        // 1.5 tokens = 1_500_000 base units, quoted at 2x in native wei
        assert_eq!(fill.amount_in, dec!(1.5));
        assert_eq!(fill.amount_out, dec!(0.000000000003));
    }

    #[tokio::test]
    async fn test_received_transfer_overrides_quote_on_buys() {
        let venue = Arc::new(FakeVenue::new(Venue::Aggregator));
        let token: Address = TOKEN.parse().unwrap();
        let wallet = Address::repeat_byte(0x01);
        let mut fake_chain = FakeChain::new(vec![Some(true)]);
        fake_chain.logs = vec![
            transfer(token, wallet, U256::from(2_900_000_000_000_000_000u128)),
            transfer(token, Address::repeat_byte(0x55), U256::from(1u64)),
            transfer(Address::repeat_byte(0x66), wallet, U256::from(1u64)),
        ];
        let fill = router(venue, Arc::new(fake_chain))
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap();
        assert_eq!(fill.amount_out, dec!(2.9));
    }

    #[tokio::test]
    async fn test_unrepresentable_quote_is_rejected_before_submission() {
        let mut fake = FakeVenue::new(Venue::Aggregator);
        fake.fixed_out = Some(U256::MAX);
        let venue = Arc::new(fake);
        let chain = Arc::new(FakeChain::new(vec![Some(true)]));
        let err = router(venue.clone(), chain.clone())
            .route(&signal(TradeAction::Buy), None, 100, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentflowError::Execution(VenueError::QuoteInvalid(_))));
        assert_eq!(*venue.quotes.lock().unwrap(), 1);
        assert!(chain.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unlisted_curve_falls_through_to_aggregator() {
        let mut curve = FakeVenue::new(Venue::BondingCurve);
        curve.listed = false;
        let aggregator = Arc::new(FakeVenue::new(Venue::Aggregator));
        let chain = Arc::new(FakeChain::new(vec![]));
        let router = ExecutionRouter::new(vec![Arc::new(curve), aggregator], chain, fast_config());
        let token: Address = TOKEN.parse().unwrap();

        let market = crate::strategy::test_support::snapshot(TOKEN, None, None, None);
        assert!(!market.is_graduated);
        let chosen = router.select_venue(token, Some(&market), None).await.unwrap();
        assert_eq!(chosen.venue(), Venue::Aggregator);
    }

    #[tokio::test]
    async fn test_configured_attempts_are_capped_at_two() {
        let venue = Arc::new(FakeVenue::new(Venue::Aggregator));
        let chain = Arc::new(FakeChain::new(vec![Some(false), Some(false), Some(true)]));
        let config = RouterConfig {
            max_attempts: 5,
            slippage_ceiling_bps: 9_000,
            ..fast_config()
        };
        let err = ExecutionRouter::new(vec![venue.clone()], chain.clone(), config)
            .route(&signal(TradeAction::Buy), None, 1_800, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentflowError::Execution(VenueError::Reverted { .. })));
        assert_eq!(chain.sent.lock().unwrap().len(), 2);
        let slippages: Vec<u32> = venue.built.lock().unwrap().iter().map(|(s, _)| *s).collect();
        assert_eq!(slippages, vec![1_800, 2_000]);
    }
}
