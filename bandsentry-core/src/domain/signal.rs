//! Directional signals and the per-instrument last-signal record.
//!
//! A `Signal` is only ever built by the decision engine. HOLD is the absence of
//! a signal and has no value of its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction of a signal or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1.0 for BUY, -1.0 for SELL. Multiplies price differences into P&L.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable directional decision for one bar of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    /// Close of the bar that produced the signal.
    pub price: f64,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
    pub stop_price: f64,
    pub target_price: f64,
}

/// Last emitted side per instrument, persisted across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSignalRecord {
    pub instrument: String,
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}

impl LastSignalRecord {
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            instrument: signal.instrument.clone(),
            side: signal.side,
            timestamp: signal.timestamp,
        }
    }
}
