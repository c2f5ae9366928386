//! Performance metrics: pure functions over an equity curve and trade list.
//!
//! Bars are intraday, so annualization takes a `bars_per_year` argument
//! instead of assuming a trading-day calendar.

use serde::{Deserialize, Serialize};

use bandsentry_core::domain::TradeRecord;

/// Aggregate statistics for one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    /// Negative fraction, e.g. -0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub entries: usize,
    pub exits: usize,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_bars_held: f64,
    pub net_pnl: f64,
    pub total_commission: f64,
}

impl PerformanceMetrics {
    pub fn compute(equity_curve: &[f64], trades: &[TradeRecord], bars_per_year: f64) -> Self {
        Self {
            total_return: total_return(equity_curve),
            annualized_return: annualized_return(equity_curve, bars_per_year),
            max_drawdown: max_drawdown(equity_curve),
            sharpe: sharpe_ratio(equity_curve, bars_per_year),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            // Every closed trade is one entry and one exit; end-of-data closes
            // included, so the two counts always match.
            entries: trades.len(),
            exits: trades.len(),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_bars_held: avg_bars_held(trades),
            net_pnl: trades.iter().map(|t| t.net_pnl).sum(),
            total_commission: trades.iter().map(|t| t.commission).sum(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual growth over the span of the curve.
pub fn annualized_return(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let (Some(&initial), Some(&last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 || last <= 0.0 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let years = (equity_curve.len() - 1) as f64 / bars_per_year;
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe from per-bar returns, zero risk-free rate.
pub fn sharpe_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * bars_per_year.sqrt()
}

/// Largest peak-to-trough decline as a negative fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Gross profit / gross loss, capped at 100.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let gross_profit: f64 = trades.iter().map(|t| t.net_pnl.max(0.0)).sum();
    let gross_loss: f64 = trades.iter().map(|t| (-t.net_pnl).max(0.0)).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

pub fn avg_bars_held(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_held).sum::<usize>() as f64 / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    trades
        .iter()
        .fold((0usize, 0usize), |(best, run), t| {
            let run = if t.is_winner() == winners { run + 1 } else { 0 };
            (best.max(run), run)
        })
        .0
}
