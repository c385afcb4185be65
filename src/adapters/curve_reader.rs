//! Bonding-curve state from the launch platform lens contract

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::Address;

use super::contracts::CurveLens;
use crate::domain::CurveState;
use crate::error::{AgentflowError, Result};
use crate::market::CurveStateReader;

pub struct OnChainCurveReader {
    provider: Arc<Provider<Http>>,
    lens: CurveLens<Provider<Http>>,
}

impl OnChainCurveReader {
    pub fn new(provider: Arc<Provider<Http>>, lens_address: Address) -> Self {
        let lens = CurveLens::new(lens_address, Arc::clone(&provider));
        Self { provider, lens }
    }
}

fn parse_token(token: &str) -> Result<Address> {
    token
        .parse()
        .map_err(|e| AgentflowError::AddressParsing(format!("{}: {}", token, e)))
}

#[async_trait]
impl CurveStateReader for OnChainCurveReader {
    async fn curve_state(&self, token: &str) -> Result<CurveState> {
        let (progress, graduated, locked) = self
            .lens
            .get_curve_state(parse_token(token)?)
            .call()
            .await
            .map_err(|e| AgentflowError::Rpc(format!("getCurveState({}): {}", token, e)))?;
        Ok(CurveState {
            progress_bps: progress.min(10_000u32.into()).as_u32(),
            is_graduated: graduated,
            is_locked: locked,
        })
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }
}
