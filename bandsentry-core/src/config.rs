//! Engine parameters shared by the live scan and the backtest replay.
//!
//! The same `EngineConfig` drives both paths, which is what keeps their
//! decisions identical for identical bars.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be >= 1 (got {value})")]
    ZeroWindow { field: &'static str, value: usize },
    #[error("{field} must be finite and >= 0 (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be finite and > 0 (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must lie in [0, 1] (got {value})")]
    OutOfUnitRange { field: &'static str, value: f64 },
}

/// Rolling-window parameters for the band and range indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    /// Bollinger window N.
    pub bollinger_window: usize,
    /// Band multiplier k.
    pub bollinger_k: f64,
    /// ATR window M.
    pub atr_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            bollinger_window: 20,
            bollinger_k: 2.0,
            atr_window: 14,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bollinger_window == 0 {
            return Err(ConfigError::ZeroWindow {
                field: "indicators.bollinger_window",
                value: self.bollinger_window,
            });
        }
        if self.atr_window == 0 {
            return Err(ConfigError::ZeroWindow {
                field: "indicators.atr_window",
                value: self.atr_window,
            });
        }
        if !(self.bollinger_k.is_finite() && self.bollinger_k >= 0.0) {
            return Err(ConfigError::Negative {
                field: "indicators.bollinger_k",
                value: self.bollinger_k,
            });
        }
        Ok(())
    }

    /// Index of the first bar that can carry a snapshot.
    pub fn warmup_bars(&self) -> usize {
        self.bollinger_window.max(self.atr_window).saturating_sub(1)
    }
}

/// Decision-rule parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionParams {
    /// Confidence must be strictly greater than this to produce a signal.
    pub confidence_threshold: f64,
    /// Stop and target sit this many ATRs from the entry price.
    pub atr_multiplier: f64,
}

impl Default for DecisionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            atr_multiplier: 1.5,
        }
    }
}

impl DecisionParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::OutOfUnitRange {
                field: "decision.confidence_threshold",
                value: self.confidence_threshold,
            });
        }
        if !(self.atr_multiplier.is_finite() && self.atr_multiplier > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "decision.atr_multiplier",
                value: self.atr_multiplier,
            });
        }
        Ok(())
    }
}

/// Full engine configuration: indicators + decision rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub indicators: IndicatorParams,
    pub decision: DecisionParams,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators.validate()?;
        self.decision.validate()
    }
}
