//! In-process ledger for dry runs and tests

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    AgentContext, Delegation, Execution, ExecutionStatus, Holding, PerformanceMetrics, TokenPosition,
};
use crate::error::{AgentflowError, Result};
use crate::settlement::{LedgerStore, SettlementBatch};

#[derive(Default)]
struct State {
    agents: HashMap<String, (AgentContext, PerformanceMetrics)>,
    /// Insertion order for stable pnl history
    execution_order: Vec<Uuid>,
    executions: HashMap<Uuid, Execution>,
    delegations: Vec<Delegation>,
    positions: HashMap<(String, String), TokenPosition>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<State>,
}

fn position_key(agent_id: &str, token_address: &str) -> (String, String) {
    (agent_id.to_string(), token_address.to_ascii_lowercase())
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. Holdings on the context seed token positions at zero cost.
    pub async fn insert_agent(&self, agent: AgentContext) {
        let mut state = self.state.write().await;
        for holding in &agent.holdings {
            let mut position = TokenPosition::empty(&agent.id, &holding.token_address, &holding.symbol);
            position.balance = holding.balance;
            state
                .positions
                .insert(position_key(&agent.id, &holding.token_address), position);
        }
        let metrics = PerformanceMetrics {
            total_pnl: agent.total_pnl,
            max_drawdown: agent.max_drawdown,
            ..PerformanceMetrics::default()
        };
        state.agents.insert(agent.id.clone(), (agent, metrics));
    }

    pub async fn insert_delegation(&self, delegation: Delegation) {
        self.state.write().await.delegations.push(delegation);
    }

    pub async fn insert_position(&self, position: TokenPosition) {
        let key = position_key(&position.agent_id, &position.token_address);
        self.state.write().await.positions.insert(key, position);
    }

    /// Executions of an agent in creation order
    pub async fn executions(&self, agent_id: &str) -> Vec<Execution> {
        let state = self.state.read().await;
        state
            .execution_order
            .iter()
            .filter_map(|id| state.executions.get(id))
            .filter(|e| e.agent_id == agent_id)
            .cloned()
            .collect()
    }

    pub async fn metrics(&self, agent_id: &str) -> Option<PerformanceMetrics> {
        self.state
            .read()
            .await
            .agents
            .get(agent_id)
            .map(|(_, m)| m.clone())
    }

    pub async fn delegation(&self, id: Uuid) -> Option<Delegation> {
        self.state
            .read()
            .await
            .delegations
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    fn completed_on(execution: &Execution, agent_id: &str, day: NaiveDate) -> bool {
        execution.agent_id == agent_id
            && execution.status == ExecutionStatus::Success
            && execution
                .completed_at
                .map(|t| t.date_naive() == day)
                .unwrap_or(false)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn active_agents(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.state.read().await.agents.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn load_agent(&self, agent_id: &str) -> Result<AgentContext> {
        let state = self.state.read().await;
        let (agent, metrics) = state
            .agents
            .get(agent_id)
            .ok_or_else(|| AgentflowError::AgentNotFound(agent_id.to_string()))?;

        let mut holdings: Vec<Holding> = state
            .positions
            .values()
            .filter(|p| p.agent_id == agent_id && p.balance > Decimal::ZERO)
            .map(|p| Holding {
                token_address: p.token_address.clone(),
                symbol: p.symbol.clone(),
                balance: p.balance,
                value_usd: p.balance * p.avg_buy_price,
            })
            .collect();
        holdings.sort_by(|a, b| a.token_address.cmp(&b.token_address));

        Ok(AgentContext {
            total_pnl: metrics.total_pnl,
            max_drawdown: metrics.max_drawdown,
            wallet_balance: None,
            holdings,
            ..agent.clone()
        })
    }

    async fn create_execution(&self, execution: &Execution) -> Result<()> {
        let mut state = self.state.write().await;
        if state.executions.contains_key(&execution.id) {
            return Err(AgentflowError::Validation(format!(
                "execution {} already exists",
                execution.id
            )));
        }
        state.execution_order.push(execution.id);
        state.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Execution> {
        self.state
            .read()
            .await
            .executions
            .get(&id)
            .cloned()
            .ok_or_else(|| AgentflowError::ExecutionNotFound(id.to_string()))
    }

    async fn successful_pnls(&self, agent_id: &str) -> Result<Vec<Decimal>> {
        let state = self.state.read().await;
        Ok(state
            .execution_order
            .iter()
            .filter_map(|id| state.executions.get(id))
            .filter(|e| e.agent_id == agent_id && e.status == ExecutionStatus::Success)
            .map(|e| e.pnl_usd.unwrap_or(Decimal::ZERO))
            .collect())
    }

    async fn daily_realized_pnl(&self, agent_id: &str, day: NaiveDate) -> Result<Decimal> {
        let state = self.state.read().await;
        Ok(state
            .executions
            .values()
            .filter(|e| Self::completed_on(e, agent_id, day))
            .filter_map(|e| e.pnl_usd)
            .sum())
    }

    async fn daily_trade_count(&self, agent_id: &str, day: NaiveDate) -> Result<u32> {
        let state = self.state.read().await;
        let count = state
            .executions
            .values()
            .filter(|e| Self::completed_on(e, agent_id, day))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn active_delegations(&self, agent_id: &str) -> Result<Vec<Delegation>> {
        Ok(self
            .state
            .read()
            .await
            .delegations
            .iter()
            .filter(|d| d.agent_id == agent_id && d.is_active())
            .cloned()
            .collect())
    }

    async fn token_position(
        &self,
        agent_id: &str,
        token_address: &str,
    ) -> Result<Option<TokenPosition>> {
        Ok(self
            .state
            .read()
            .await
            .positions
            .get(&position_key(agent_id, token_address))
            .cloned())
    }

    async fn commit_settlement(&self, batch: &SettlementBatch) -> Result<()> {
        let mut state = self.state.write().await;
        let exec = &batch.execution;

        // Validate everything before the first write
        match state.executions.get(&exec.id) {
            Some(current) if current.status == ExecutionStatus::Executing => {}
            Some(current) => {
                return Err(AgentflowError::InvalidStateTransition {
                    from: current.status.to_string(),
                    to: exec.status.to_string(),
                })
            }
            None => return Err(AgentflowError::ExecutionNotFound(exec.id.to_string())),
        }
        if let Some(update) = &batch.agent_update {
            if !state.agents.contains_key(&update.agent_id) {
                return Err(AgentflowError::AgentNotFound(update.agent_id.clone()));
            }
        }
        for credit in &batch.delegation_credits {
            if !state.delegations.iter().any(|d| d.id == credit.delegation_id) {
                return Err(AgentflowError::Validation(format!(
                    "unknown delegation {}",
                    credit.delegation_id
                )));
            }
        }

        state.executions.insert(exec.id, exec.clone());
        if let Some(update) = &batch.agent_update {
            if let Some((_, metrics)) = state.agents.get_mut(&update.agent_id) {
                *metrics = update.metrics.clone();
            }
        }
        if let Some(position) = &batch.position {
            let key = position_key(&position.agent_id, &position.token_address);
            state.positions.insert(key, position.clone());
        }
        for credit in &batch.delegation_credits {
            if let Some(d) = state
                .delegations
                .iter_mut()
                .find(|d| d.id == credit.delegation_id)
            {
                d.accumulated_pnl += credit.amount;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RiskLevel, RouteFill, StrategyKind, Venue};
    use crate::settlement::{AgentMetricsUpdate, DelegationCredit};
    use crate::strategy::test_support;
    use rust_decimal_macros::dec;

    fn execution() -> Execution {
        let signal = crate::domain::TradeSignal::new(
            crate::domain::TradeAction::Buy,
            "0xabc",
            "ABC",
            dec!(1),
            80.0,
            "test",
            StrategyKind::Dca,
            crate::domain::SignalDiagnostics::Dca {
                discount_pct: 3.0,
                candidates: 1,
            },
        );
        Execution::begin("agent-1", signal)
    }

    fn fill() -> RouteFill {
        RouteFill {
            tx_hash: "0x01".into(),
            venue: Venue::Aggregator,
            amount_in: dec!(1),
            amount_out: dec!(10),
            gas_used: None,
            attempts: 1,
            slippage_bps: 100,
            used_permit: false,
        }
    }

    #[tokio::test]
    async fn test_commit_applies_batch_and_counts_today() {
        let ledger = InMemoryLedger::new();
        ledger
            .insert_agent(test_support::agent(StrategyKind::Dca, RiskLevel::Low))
            .await;
        let delegation = Delegation::new("agent-1", dec!(100));
        let delegation_id = delegation.id;
        ledger.insert_delegation(delegation).await;

        let mut exec = execution();
        ledger.create_execution(&exec).await.unwrap();
        exec.mark_success(fill(), dec!(4)).unwrap();

        let mut position = TokenPosition::empty("agent-1", "0xABC", "ABC");
        position.balance = dec!(10);
        position.avg_buy_price = dec!(0.1);
        let batch = SettlementBatch {
            execution: exec.clone(),
            agent_update: Some(AgentMetricsUpdate {
                agent_id: "agent-1".into(),
                metrics: PerformanceMetrics {
                    total_pnl: dec!(4),
                    trade_count: 1,
                    ..PerformanceMetrics::default()
                },
            }),
            position: Some(position),
            delegation_credits: vec![DelegationCredit {
                delegation_id,
                amount: dec!(0.32),
                fee: dec!(0.08),
            }],
        };
        ledger.commit_settlement(&batch).await.unwrap();

        let today = chrono::Utc::now().date_naive();
        assert_eq!(ledger.daily_trade_count("agent-1", today).await.unwrap(), 1);
        assert_eq!(ledger.daily_realized_pnl("agent-1", today).await.unwrap(), dec!(4));
        assert_eq!(ledger.successful_pnls("agent-1").await.unwrap(), vec![dec!(4)]);
        assert_eq!(
            ledger.delegation(delegation_id).await.unwrap().accumulated_pnl,
            dec!(0.32)
        );

        let agent = ledger.load_agent("agent-1").await.unwrap();
        assert_eq!(agent.total_pnl, dec!(4));
        assert_eq!(agent.held_balance("0xabc"), dec!(10));
        assert!(agent.wallet_balance.is_none());

        // Second commit of the same execution is rejected
        assert!(ledger.commit_settlement(&batch).await.is_err());
    }

    #[tokio::test]
    async fn test_rejected_batch_writes_nothing() {
        let ledger = InMemoryLedger::new();
        ledger
            .insert_agent(test_support::agent(StrategyKind::Dca, RiskLevel::Low))
            .await;
        let mut exec = execution();
        ledger.create_execution(&exec).await.unwrap();
        exec.mark_success(fill(), dec!(4)).unwrap();

        let batch = SettlementBatch {
            execution: exec.clone(),
            agent_update: None,
            position: None,
            delegation_credits: vec![DelegationCredit {
                delegation_id: Uuid::new_v4(),
                amount: dec!(1),
                fee: Decimal::ZERO,
            }],
        };
        assert!(ledger.commit_settlement(&batch).await.is_err());
        let stored = ledger.get_execution(exec.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Executing);
    }
}
