//! Pro-rata delegator PnL distribution

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::Delegation;

use super::ledger::DelegationCredit;

const BPS_DENOMINATOR: Decimal = dec!(10000);

/// Credits for every active delegation. Empty when the trade broke even.
///
/// Each share is `min(1, amount / total_capital) * pnl`. Positive shares pay the
/// performance fee before crediting; negative shares are passed through unchanged.
pub fn distribute(
    delegations: &[Delegation],
    total_capital: Decimal,
    trade_pnl: Decimal,
    performance_fee_bps: u32,
) -> Vec<DelegationCredit> {
    if trade_pnl.is_zero() || total_capital <= Decimal::ZERO {
        return Vec::new();
    }
    let fee_rate = Decimal::from(performance_fee_bps) / BPS_DENOMINATOR;

    delegations
        .iter()
        .filter(|d| d.is_active() && d.amount > Decimal::ZERO)
        .map(|d| {
            let ratio = (d.amount / total_capital).min(Decimal::ONE);
            let share = ratio * trade_pnl;
            let fee = if share > Decimal::ZERO {
                share * fee_rate
            } else {
                Decimal::ZERO
            };
            DelegationCredit {
                delegation_id: d.id,
                amount: share - fee,
                fee,
            }
        })
        .collect()
}
