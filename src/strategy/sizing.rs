//! Position sizing shared by every strategy

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::AgentContext;

use super::risk_table::RiskParameters;

/// Native units always left in the wallet for fees
pub const GAS_RESERVE: Decimal = dec!(5.0);

/// Cap a desired buy size to what the wallet can spend above the gas reserve.
///
/// Unknown wallet balance sizes to zero.
pub fn safe_size(desired: Decimal, wallet_balance: Option<Decimal>) -> Decimal {
    let Some(balance) = wallet_balance else {
        return Decimal::ZERO;
    };
    let spendable = (balance - GAS_RESERVE).max(Decimal::ZERO);
    desired.max(Decimal::ZERO).min(spendable)
}

/// Tier-based buy size scaled by `multiplier`, capped by the wallet
pub fn buy_size(agent: &AgentContext, params: &RiskParameters, multiplier: Decimal) -> Decimal {
    let desired = agent.total_capital * params.max_position_pct * multiplier;
    safe_size(desired, agent.wallet_balance)
}
