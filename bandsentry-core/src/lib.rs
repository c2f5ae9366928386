//! bandsentry core: the signal decision engine.
//!
//! - Domain types (bars, signals, simulated positions, trades)
//! - Streaming volatility-band and true-range indicators
//! - Confidence classifier (scoring artifact or band-excess heuristic)
//! - Band-breach decision rule with ATR-sized stop/target
//! - Duplicate suppression over a pluggable last-signal store
//! - Historical replay with a single-position tracker
//!
//! Live scanning and backtesting share one `SignalPipeline`, so the same bars
//! always yield the same decisions on both paths.

pub mod backtest;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod domain;
pub mod indicators;
pub mod pipeline;
pub mod suppression;

pub use config::{ConfigError, DecisionParams, EngineConfig, IndicatorParams};
pub use decision::{BandZone, Decision, DecisionEngine};
pub use pipeline::{BarEvaluation, SignalPipeline};
