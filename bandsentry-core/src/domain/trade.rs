//! TradeRecord: a completed round-trip simulated trade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::Side;

/// Why a simulated position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Opposite-side signal forced a close before the new entry.
    Flip,
    /// Position still open on the last bar of the series.
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::Flip => "flip",
            Self::EndOfData => "end_of_data",
        }
    }
}

/// A complete round-trip trade record: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Identification ──
    pub instrument: String,
    pub side: Side,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub stake: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,

    // ── Duration ──
    pub bars_held: usize,
}

impl TradeRecord {
    /// Return on the trade as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.stake == 0.0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.stake)
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}
