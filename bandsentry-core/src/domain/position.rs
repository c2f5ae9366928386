use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{Side, Signal};

/// Open simulated position inside a backtest. At most one per instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPosition {
    pub instrument: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Bar index of the entry, used to skip exit checks on the entry bar.
    pub entry_bar: usize,
}

impl SimulatedPosition {
    pub fn open(signal: &Signal, entry_bar: usize) -> Self {
        Self {
            instrument: signal.instrument.clone(),
            side: signal.side,
            entry_price: signal.price,
            stop_price: signal.stop_price,
            target_price: signal.target_price,
            entry_time: signal.timestamp,
            entry_bar,
        }
    }

    /// Unrealized P&L at `price` for `stake` units.
    pub fn unrealized_pnl(&self, price: f64, stake: f64) -> f64 {
        (price - self.entry_price) * self.side.sign() * stake
    }
}
