//! Weighted-average cost basis per (agent, token)
//!
//! All prices and costs are in MON.

use rust_decimal::Decimal;

use crate::domain::TokenPosition;

/// Add `tokens_bought` acquired for `mon_spent` to a position
pub fn apply_buy(mut position: TokenPosition, mon_spent: Decimal, tokens_bought: Decimal) -> TokenPosition {
    let new_balance = position.balance + tokens_bought;
    let new_cost = position.total_cost + mon_spent;
    position.avg_buy_price = if new_balance > Decimal::ZERO {
        new_cost / new_balance
    } else {
        Decimal::ZERO
    };
    position.balance = new_balance;
    position.total_cost = new_cost;
    position
}

/// Remove `tokens_sold` for `mon_received`, realizing PnL against the average price.
///
/// A sell with no position is a no-op and returns `None`. Sales beyond the recorded
/// balance are capped at that balance.
pub fn apply_sell(
    position: Option<TokenPosition>,
    tokens_sold: Decimal,
    mon_received: Decimal,
) -> Option<TokenPosition> {
    let mut position = position?;
    if position.balance <= Decimal::ZERO || tokens_sold <= Decimal::ZERO {
        return None;
    }

    let sell_price = mon_received / tokens_sold;
    let sold = tokens_sold.min(position.balance);
    let realized = (sell_price - position.avg_buy_price) * sold;

    let remaining = position.balance - sold;
    position.total_cost = if remaining > Decimal::ZERO {
        position.total_cost * remaining / position.balance
    } else {
        Decimal::ZERO
    };
    position.balance = remaining;
    position.realized_pnl += realized;
    Some(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn empty() -> TokenPosition {
        TokenPosition::empty("agent-1", "0xt", "T")
    }

    #[test]
    fn sequential_buys_match_one_blended_buy() {
        let split = apply_buy(apply_buy(empty(), dec!(10), dec!(100)), dec!(30), dec!(200));
        let single = apply_buy(empty(), dec!(40), dec!(300));
        assert_eq!(split.avg_buy_price, single.avg_buy_price);
        assert_eq!(split.balance, dec!(300));
        assert_eq!(split.total_cost, dec!(40));
    }

    #[test]
    fn sell_realizes_against_average_and_reduces_cost() {
        let pos = apply_buy(empty(), dec!(10), dec!(100)); // avg 0.1
        let after = apply_sell(Some(pos), dec!(40), dec!(6)).unwrap(); // sold at 0.15
        assert_eq!(after.balance, dec!(60));
        assert_eq!(after.realized_pnl, dec!(2));
        assert_eq!(after.total_cost, dec!(6));
        assert_eq!(after.avg_buy_price, dec!(0.1));
    }

    #[test]
    fn sell_without_position_is_a_no_op() {
        assert!(apply_sell(None, dec!(5), dec!(1)).is_none());
        assert!(apply_sell(Some(empty()), dec!(5), dec!(1)).is_none());
    }

    #[test]
    fn full_exit_clears_cost() {
        let pos = apply_buy(empty(), dec!(10), dec!(100));
        let after = apply_sell(Some(pos), dec!(100), dec!(8)).unwrap();
        assert_eq!(after.balance, Decimal::ZERO);
        assert_eq!(after.total_cost, Decimal::ZERO);
        assert_eq!(after.realized_pnl, dec!(-2));
    }
}
