//! Rolling agent performance metrics

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::PerformanceMetrics;

const MIN_STD_DEV: f64 = 1e-10;

/// Recompute metrics from the full SUCCESS history (oldest first, current trade included)
pub fn compute_metrics(
    history: &[Decimal],
    total_capital: Decimal,
    total_pnl: Decimal,
) -> PerformanceMetrics {
    let trade_count = history.len() as u32;
    let wins = history.iter().filter(|p| **p > Decimal::ZERO).count();
    let win_rate = if history.is_empty() {
        0.0
    } else {
        wins as f64 / history.len() as f64
    };

    PerformanceMetrics {
        sharpe_ratio: sharpe_ratio(history),
        max_drawdown: max_drawdown(history, total_capital),
        win_rate,
        trade_count,
        total_pnl,
    }
}

/// Per-trade Sharpe: mean over sample standard deviation
pub fn sharpe_ratio(pnls: &[Decimal]) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }
    let values: Vec<f64> = pnls.iter().map(|p| p.to_f64().unwrap_or(0.0)).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev < MIN_STD_DEV {
        return 0.0;
    }
    mean / std_dev
}

/// Largest peak-to-trough decline of `capital + cumulative pnl`, as a fraction
pub fn max_drawdown(pnls: &[Decimal], total_capital: Decimal) -> Decimal {
    let mut equity = total_capital;
    let mut peak = total_capital;
    let mut worst = Decimal::ZERO;

    for pnl in pnls {
        equity += *pnl;
        if equity > peak {
            peak = equity;
        }
        if peak > Decimal::ZERO {
            let drawdown = (peak - equity) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst.min(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sharpe_needs_two_trades_and_variance() {
        assert_eq!(sharpe_ratio(&[dec!(5)]), 0.0);
        assert_eq!(sharpe_ratio(&[dec!(5), dec!(5), dec!(5)]), 0.0);

        // mean 2, sample std 2
        let s = sharpe_ratio(&[dec!(0), dec!(4), dec!(2)]);
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        // 1000 -> 1100 (peak) -> 990 -> 1045
        let dd = max_drawdown(&[dec!(100), dec!(-110), dec!(55)], dec!(1000));
        assert_eq!(dd, dec!(0.1));
        assert_eq!(max_drawdown(&[dec!(10), dec!(20)], dec!(1000)), Decimal::ZERO);
    }

    #[test]
    fn win_rate_and_count_cover_full_history() {
        let m = compute_metrics(&[dec!(10), dec!(-5), dec!(3), dec!(0)], dec!(1000), dec!(8));
        assert_eq!(m.trade_count, 4);
        assert!((m.win_rate - 0.5).abs() < 1e-12);
        assert_eq!(m.total_pnl, dec!(8));
    }
}
