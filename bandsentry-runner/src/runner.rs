//! Backtest runner: wires together loading, the core replay and metrics.
//!
//! Two entry points:
//! - `run_backtest_from_data()`: replays one pre-loaded series.
//! - `run_backtests()`: loads and replays several instruments in parallel.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use bandsentry_core::backtest::{BacktestError, BacktestRunner, EquityPoint};
use bandsentry_core::classifier::{ClassifierMode, SignalClassifier};
use bandsentry_core::domain::{Bar, TradeRecord};
use bandsentry_core::{BarEvaluation, SignalPipeline};

use crate::config::{AppConfig, ConfigError, RunId};
use crate::data_loader::{load_instrument, DataSource, LoadError, LoadOptions, LoadedSeries};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("backtest of '{instrument}' failed: {source}")]
    Backtest {
        instrument: String,
        #[source]
        source: BacktestError,
    },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one instrument's replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub instrument: String,
    pub source: DataSource,
    pub dataset_hash: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub bar_count: usize,
    pub warmup_bars: usize,
    pub signal_count: usize,
    pub emitted_count: usize,
    pub initial_capital: f64,
    /// `heuristic` or the artifact name.
    pub classifier: String,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    /// Per-bar decision trail. Exported as its own CSV, not kept in the JSON.
    #[serde(skip)]
    pub history: Vec<HistoryRow>,
}

/// One bar of the decision trail, with trade entry and exit marks.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub bar: Bar,
    pub evaluation: BarEvaluation,
    /// A trade opened on this bar.
    pub entry: bool,
    /// A trade closed on this bar.
    pub exit: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn suppressed_count(&self) -> usize {
        self.signal_count.saturating_sub(self.emitted_count)
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}

pub fn classifier_label(classifier: &SignalClassifier) -> String {
    match classifier.mode() {
        ClassifierMode::Model(name) => name,
        ClassifierMode::Heuristic => "heuristic".to_string(),
    }
}

/// Replay one pre-loaded series.
pub fn run_backtest_from_data(
    series: &LoadedSeries,
    config: &AppConfig,
    classifier: SignalClassifier,
) -> Result<BacktestResult, RunError> {
    let run_id = config.run_id()?;
    let classifier_name = classifier_label(&classifier);
    let pipeline = SignalPipeline::new(&config.engine_config(), classifier)
        .map_err(|e| RunError::Config(e.into()))?;
    let runner = BacktestRunner::new(pipeline, config.backtest.simulation.clone())
        .map_err(|e| RunError::Config(e.into()))?;

    let outcome = runner.run(&series.bars).map_err(|source| RunError::Backtest {
        instrument: series.instrument.clone(),
        source,
    })?;

    let history = signal_history(
        &series.bars,
        runner.pipeline().evaluations(&series.bars),
        &outcome.trades,
    );
    let equity: Vec<f64> = outcome.equity_curve.iter().map(|p| p.equity).collect();
    let metrics =
        PerformanceMetrics::compute(&equity, &outcome.trades, config.backtest.bars_per_year());

    info!(
        instrument = %series.instrument,
        trades = outcome.trades.len(),
        signals = outcome.signal_count,
        emitted = outcome.emitted_count,
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        instrument: series.instrument.clone(),
        source: series.source,
        dataset_hash: series.dataset_hash.clone(),
        start_time: series.bars.first().map(|b| b.timestamp),
        end_time: series.bars.last().map(|b| b.timestamp),
        bar_count: series.bars.len(),
        warmup_bars: config.indicators.warmup_bars(),
        signal_count: outcome.signal_count,
        emitted_count: outcome.emitted_count,
        initial_capital: config.backtest.simulation.initial_capital,
        classifier: classifier_name,
        metrics,
        trades: outcome.trades,
        equity_curve: outcome.equity_curve,
        history,
    })
}

fn signal_history(
    bars: &[Bar],
    evaluations: Vec<BarEvaluation>,
    trades: &[TradeRecord],
) -> Vec<HistoryRow> {
    bars.iter()
        .zip(evaluations)
        .enumerate()
        .map(|(i, (bar, evaluation))| HistoryRow {
            bar: bar.clone(),
            evaluation,
            entry: trades.iter().any(|t| t.entry_bar == i),
            exit: trades.iter().any(|t| t.exit_bar == i),
        })
        .collect()
}

/// Load and replay every instrument in parallel.
///
/// Results come back in input order. The first failing instrument, in input
/// order, fails the whole run.
pub fn run_backtests(
    config: &AppConfig,
    instruments: &[String],
    opts: &LoadOptions,
) -> Result<Vec<BacktestResult>, RunError> {
    config.validate()?;
    let classifier = SignalClassifier::from_artifact_path(config.classifier.artifact.as_deref());
    info!(
        instruments = instruments.len(),
        classifier = %classifier_label(&classifier),
        "starting backtests"
    );

    instruments
        .par_iter()
        .map(|instrument| {
            let series = load_instrument(instrument, opts)?;
            run_backtest_from_data(&series, config, classifier.clone())
        })
        .collect()
}
