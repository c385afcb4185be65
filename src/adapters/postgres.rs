use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{
    AgentContext, Delegation, DelegationStatus, Execution, ExecutionStatus, Holding, RouteFill,
    TokenPosition, TradeSignal,
};
use crate::error::{AgentflowError, Result};
use crate::settlement::{LedgerStore, SettlementBatch};

/// PostgreSQL ledger
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_enum<T: std::str::FromStr<Err = &'static str>>(raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|e| AgentflowError::Validation(format!("{}: '{}'", e, raw)))
}

fn delegation_status(raw: &str) -> Result<DelegationStatus> {
    match raw {
        "ACTIVE" => Ok(DelegationStatus::Active),
        "WITHDRAWN" => Ok(DelegationStatus::Withdrawn),
        other => Err(AgentflowError::Validation(format!(
            "unknown delegation status '{}'",
            other
        ))),
    }
}

fn non_negative_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn execution_from_row(r: &PgRow) -> Result<Execution> {
    let params: Json<TradeSignal> = r.try_get("params")?;
    let result: Option<Json<RouteFill>> = r.try_get("result")?;
    let status: String = r.try_get("status")?;
    let gas_used: Option<i64> = r.try_get("gas_used")?;
    Ok(Execution {
        id: r.try_get("id")?,
        agent_id: r.try_get("agent_id")?,
        kind: params.0.action,
        params: params.0,
        status: ExecutionStatus::try_from(status.as_str())?,
        tx_hash: r.try_get("tx_hash")?,
        pnl_usd: r.try_get("pnl_usd")?,
        gas_used: gas_used.and_then(|g| u64::try_from(g).ok()),
        result: result.map(|j| j.0),
        executed_at: r.try_get("executed_at")?,
        completed_at: r.try_get("completed_at")?,
        error_msg: r.try_get("error_msg")?,
    })
}

fn position_from_row(r: &PgRow) -> Result<TokenPosition> {
    Ok(TokenPosition {
        agent_id: r.try_get("agent_id")?,
        token_address: r.try_get("token_address")?,
        symbol: r.try_get("symbol")?,
        balance: r.try_get("balance")?,
        avg_buy_price: r.try_get("avg_buy_price")?,
        total_cost: r.try_get("total_cost")?,
        realized_pnl: r.try_get("realized_pnl")?,
    })
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn active_agents(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM agents WHERE status = 'ACTIVE' ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map_err(Into::into))
            .collect()
    }

    #[instrument(skip(self))]
    async fn load_agent(&self, agent_id: &str) -> Result<AgentContext> {
        let row = sqlx::query(
            r#"
            SELECT id, strategy, risk_level, total_capital, total_pnl, max_drawdown,
                   daily_loss_limit, max_daily_trades
            FROM agents WHERE id = $1
            "#,
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AgentflowError::AgentNotFound(agent_id.to_string()))?;

        let holdings = sqlx::query(
            r#"
            SELECT token_address, symbol, balance, avg_buy_price
            FROM token_positions
            WHERE agent_id = $1 AND balance > 0
            ORDER BY token_address
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|r| -> Result<Holding> {
            let balance: Decimal = r.try_get("balance")?;
            let avg: Decimal = r.try_get("avg_buy_price")?;
            Ok(Holding {
                token_address: r.try_get("token_address")?,
                symbol: r.try_get("symbol")?,
                balance,
                value_usd: balance * avg,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        let strategy: String = row.try_get("strategy")?;
        let risk_level: String = row.try_get("risk_level")?;
        Ok(AgentContext {
            id: row.try_get("id")?,
            strategy: parse_enum(&strategy)?,
            risk_level: parse_enum(&risk_level)?,
            total_capital: row.try_get("total_capital")?,
            total_pnl: row.try_get("total_pnl")?,
            max_drawdown: row.try_get("max_drawdown")?,
            wallet_balance: None,
            holdings,
            daily_loss_limit: row.try_get("daily_loss_limit")?,
            max_daily_trades: non_negative_u32(row.try_get("max_daily_trades")?),
        })
    }

    #[instrument(skip(self, execution), fields(execution_id = %execution.id))]
    async fn create_execution(&self, execution: &Execution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO executions (id, agent_id, kind, params, status, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(execution.id)
        .bind(&execution.agent_id)
        .bind(execution.kind.as_str())
        .bind(Json(&execution.params))
        .bind(execution.status.as_str())
        .bind(execution.executed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Execution> {
        let row = sqlx::query(
            r#"
            SELECT id, agent_id, params, status, tx_hash, pnl_usd, gas_used, result,
                   executed_at, completed_at, error_msg
            FROM executions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AgentflowError::ExecutionNotFound(id.to_string()))?;
        execution_from_row(&row)
    }

    async fn successful_pnls(&self, agent_id: &str) -> Result<Vec<Decimal>> {
        let rows = sqlx::query(
            r#"
            SELECT pnl_usd FROM executions
            WHERE agent_id = $1 AND status = 'SUCCESS'
            ORDER BY completed_at ASC
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                r.try_get::<Option<Decimal>, _>("pnl_usd")
                    .map(|p| p.unwrap_or(Decimal::ZERO))
                    .map_err(Into::into)
            })
            .collect()
    }

    async fn daily_realized_pnl(&self, agent_id: &str, day: NaiveDate) -> Result<Decimal> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(pnl_usd), 0) AS total FROM executions
            WHERE agent_id = $1 AND status = 'SUCCESS'
              AND (completed_at AT TIME ZONE 'UTC')::date = $2
            "#,
        )
        .bind(agent_id)
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }

    async fn daily_trade_count(&self, agent_id: &str, day: NaiveDate) -> Result<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS trades FROM executions
            WHERE agent_id = $1 AND status = 'SUCCESS'
              AND (completed_at AT TIME ZONE 'UTC')::date = $2
            "#,
        )
        .bind(agent_id)
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        let trades: i64 = row.try_get("trades")?;
        Ok(u32::try_from(trades).unwrap_or(u32::MAX))
    }

    async fn active_delegations(&self, agent_id: &str) -> Result<Vec<Delegation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, agent_id, amount, status, accumulated_pnl, lockup_ends_at,
                   on_chain_delegation_id
            FROM delegations
            WHERE agent_id = $1 AND status = 'ACTIVE'
            ORDER BY created_at ASC
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<Delegation> {
                let status: String = r.try_get("status")?;
                Ok(Delegation {
                    id: r.try_get("id")?,
                    agent_id: r.try_get("agent_id")?,
                    amount: r.try_get("amount")?,
                    status: delegation_status(&status)?,
                    accumulated_pnl: r.try_get("accumulated_pnl")?,
                    lockup_ends_at: r.try_get("lockup_ends_at")?,
                    on_chain_delegation_id: r.try_get("on_chain_delegation_id")?,
                })
            })
            .collect()
    }

    async fn token_position(
        &self,
        agent_id: &str,
        token_address: &str,
    ) -> Result<Option<TokenPosition>> {
        let row = sqlx::query(
            r#"
            SELECT agent_id, token_address, symbol, balance, avg_buy_price, total_cost, realized_pnl
            FROM token_positions
            WHERE agent_id = $1 AND token_address = $2
            "#,
        )
        .bind(agent_id)
        .bind(token_address.to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(position_from_row).transpose()
    }

    /// Apply every write of a settlement in one transaction
    #[instrument(skip(self, batch), fields(execution_id = %batch.execution.id))]
    async fn commit_settlement(&self, batch: &SettlementBatch) -> Result<()> {
        let exec = &batch.execution;
        let mut tx = self.pool.begin().await?;

        let finalized = sqlx::query(
            r#"
            UPDATE executions SET
                status = $2,
                tx_hash = $3,
                pnl_usd = $4,
                gas_used = $5,
                result = $6,
                completed_at = $7,
                error_msg = $8
            WHERE id = $1 AND status = 'EXECUTING'
            "#,
        )
        .bind(exec.id)
        .bind(exec.status.as_str())
        .bind(&exec.tx_hash)
        .bind(exec.pnl_usd)
        .bind(exec.gas_used.and_then(|g| i64::try_from(g).ok()))
        .bind(exec.result.as_ref().map(Json))
        .bind(exec.completed_at)
        .bind(&exec.error_msg)
        .execute(&mut *tx)
        .await?;

        if finalized.rows_affected() != 1 {
            // Dropping the transaction rolls it back
            return Err(AgentflowError::InvalidStateTransition {
                from: "terminal".into(),
                to: exec.status.to_string(),
            });
        }

        if let Some(update) = &batch.agent_update {
            let m = &update.metrics;
            sqlx::query(
                r#"
                UPDATE agents SET
                    total_pnl = $2,
                    sharpe_ratio = $3,
                    max_drawdown = $4,
                    win_rate = $5,
                    trade_count = $6,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(&update.agent_id)
            .bind(m.total_pnl)
            .bind(m.sharpe_ratio)
            .bind(m.max_drawdown)
            .bind(m.win_rate)
            .bind(i32::try_from(m.trade_count).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }

        if let Some(pos) = &batch.position {
            sqlx::query(
                r#"
                INSERT INTO token_positions
                    (agent_id, token_address, symbol, balance, avg_buy_price, total_cost, realized_pnl, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
                ON CONFLICT (agent_id, token_address) DO UPDATE SET
                    symbol = EXCLUDED.symbol,
                    balance = EXCLUDED.balance,
                    avg_buy_price = EXCLUDED.avg_buy_price,
                    total_cost = EXCLUDED.total_cost,
                    realized_pnl = EXCLUDED.realized_pnl,
                    updated_at = NOW()
                "#,
            )
            .bind(&pos.agent_id)
            .bind(pos.token_address.to_ascii_lowercase())
            .bind(&pos.symbol)
            .bind(pos.balance)
            .bind(pos.avg_buy_price)
            .bind(pos.total_cost)
            .bind(pos.realized_pnl)
            .execute(&mut *tx)
            .await?;
        }

        for credit in &batch.delegation_credits {
            sqlx::query(
                "UPDATE delegations SET accumulated_pnl = accumulated_pnl + $2 WHERE id = $1",
            )
            .bind(credit.delegation_id)
            .bind(credit.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            status = %exec.status,
            credits = batch.delegation_credits.len(),
            "settlement committed"
        );
        Ok(())
    }
}
