//! BandSentry Runner: orchestration on top of `bandsentry-core`.
//!
//! This crate provides:
//! - TOML application config and run fingerprinting
//! - Bar loading from CSV with a deterministic synthetic fallback
//! - The live scan (latest bar per instrument, with persistent suppression)
//! - Multi-instrument backtests with performance metrics
//! - JSON/CSV/Markdown artifacts and the live signal outputs

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod scan;

pub use config::{AppConfig, ConfigError, RunId};
pub use data_loader::{load_instrument, DataSource, LoadError, LoadOptions, LoadedSeries};
pub use metrics::PerformanceMetrics;
pub use runner::{run_backtest_from_data, run_backtests, BacktestResult, HistoryRow, RunError};
pub use scan::{InstrumentOutcome, InstrumentReport, LiveScanner, ScanError, ScanReport};
