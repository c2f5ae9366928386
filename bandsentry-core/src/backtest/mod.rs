//! Historical replay of the signal pipeline with a simulated position tracker.
//!
//! Per bar: exit check, then the emitted signal (open or flip), then the
//! equity mark at close. Signals are deduplicated through a fresh in-memory
//! suppressor, so a replay never reads live state.

pub mod exit;
pub mod runner;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{BarError, TradeRecord};
use crate::suppression::StoreError;

pub use exit::{resolve_exit, ExitFill, IntrabarPolicy};
pub use runner::BacktestRunner;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no bars to replay")]
    NoBars,
    #[error(transparent)]
    Bars(#[from] BarError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("signal state: {0}")]
    Store(#[from] StoreError),
}

/// Simulation parameters for one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Units of the instrument per position.
    pub stake: f64,
    /// Fraction of notional charged on entry and on exit.
    pub commission_rate: f64,
    pub intrabar_policy: IntrabarPolicy,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            stake: 1.0,
            commission_rate: 0.0,
            intrabar_policy: IntrabarPolicy::StopFirst,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "backtest.initial_capital",
                value: self.initial_capital,
            });
        }
        if !(self.stake.is_finite() && self.stake > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "backtest.stake",
                value: self.stake,
            });
        }
        if !(0.0..=1.0).contains(&self.commission_rate) {
            return Err(ConfigError::OutOfUnitRange {
                field: "backtest.commission_rate",
                value: self.commission_rate,
            });
        }
        Ok(())
    }
}

/// Equity after the close of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Everything one replay produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub instrument: String,
    pub trades: Vec<TradeRecord>,
    /// One point per input bar.
    pub equity_curve: Vec<EquityPoint>,
    /// Signals the decision engine produced.
    pub signal_count: usize,
    /// Signals that survived duplicate suppression.
    pub emitted_count: usize,
}

impl BacktestOutcome {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|p| p.equity)
    }

    pub fn suppressed_count(&self) -> usize {
        self.signal_count - self.emitted_count
    }
}
