//! BandSentry CLI: live scan, backtest and state commands.
//!
//! Commands:
//! - `scan`: evaluate the latest bar of every configured instrument
//! - `backtest`: replay the pipeline over historical bars and export artifacts
//! - `state show`: print the persisted last-signal records

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bandsentry_core::classifier::SignalClassifier;
use bandsentry_core::suppression::{JsonFileStore, SignalStore};
use bandsentry_core::SignalPipeline;
use bandsentry_runner::export::{append_signal_log, save_run, write_signals};
use bandsentry_runner::{
    load_instrument, run_backtests, AppConfig, BacktestResult, InstrumentOutcome, LiveScanner,
    LoadOptions, ScanReport,
};

#[derive(Parser)]
#[command(
    name = "bandsentry",
    about = "BandSentry: volatility-band breakout signals with duplicate suppression"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Generate synthetic bars for instruments without a CSV file.
    #[arg(long, global = true, default_value_t = false)]
    synthetic: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the latest bar of each configured instrument.
    Scan {
        /// Instruments to scan instead of `live.instruments`.
        #[arg(long, num_args = 1..)]
        instruments: Option<Vec<String>>,

        /// Print the full scan report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Replay the pipeline over historical bars.
    Backtest {
        /// Instruments to replay instead of `live.instruments`.
        #[arg(long, num_args = 1..)]
        instruments: Option<Vec<String>>,

        /// Output directory instead of `backtest.output_dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Persisted signal state.
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the last emitted side per instrument.
    Show,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    if cli.synthetic {
        config.data.synthetic = true;
    }

    match cli.command {
        Commands::Scan { instruments, json } => {
            let instruments = instruments.unwrap_or_else(|| config.live.instruments.clone());
            run_scan(&config, &instruments, json)
        }
        Commands::Backtest {
            instruments,
            output_dir,
        } => {
            let instruments = instruments.unwrap_or_else(|| config.live.instruments.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.backtest.output_dir.clone());
            run_backtest_cmd(&config, &instruments, &output_dir)
        }
        Commands::State { action } => match action {
            StateAction::Show => run_state_show(&config.live.state_path),
        },
    }
}

fn load_options(config: &AppConfig) -> LoadOptions {
    LoadOptions {
        data_dir: config.data.dir.clone(),
        synthetic: config.data.synthetic,
        synthetic_bars: config.data.synthetic_bars,
        interval_minutes: config.backtest.interval_minutes,
        synthetic_end: Utc::now(),
    }
}

fn run_scan(config: &AppConfig, instruments: &[String], json: bool) -> Result<()> {
    let classifier = SignalClassifier::from_artifact_path(config.classifier.artifact.as_deref());
    let pipeline = SignalPipeline::new(&config.engine_config(), classifier)
        .context("invalid engine configuration")?;
    let scanner = LiveScanner::new(pipeline, JsonFileStore::new(&config.live.state_path));
    let opts = load_options(config);

    let run_at = Utc::now();
    let report = scanner
        .scan(instruments, run_at, |instrument| {
            load_instrument(instrument, &opts).map(|series| series.bars)
        })
        .context("scan failed")?;

    write_signals(&config.live.signals_path, &report.signals)?;
    append_signal_log(&config.live.signal_log_path, run_at, &report.signals)?;
    scanner
        .commit(&report)
        .context("failed to record emitted signals")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize scan report")?
        );
    } else {
        print_scan(&report);
    }
    Ok(())
}

fn run_backtest_cmd(config: &AppConfig, instruments: &[String], output_dir: &Path) -> Result<()> {
    let results = run_backtests(config, instruments, &load_options(config))?;
    for result in &results {
        print_summary(result);
    }
    let run_dir = save_run(&results, output_dir)?;
    info!(run_dir = %run_dir.display(), "artifacts saved");
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_state_show(state_path: &Path) -> Result<()> {
    let store = JsonFileStore::new(state_path);
    let records = store
        .load_all()
        .with_context(|| format!("failed to read state {}", state_path.display()))?;
    if records.is_empty() {
        println!("No signals recorded in {}", state_path.display());
        return Ok(());
    }
    println!("{:<14} {:<5} {}", "INSTRUMENT", "SIDE", "TIMESTAMP");
    for record in records.values() {
        println!(
            "{:<14} {:<5} {}",
            record.instrument,
            record.side,
            record.timestamp.to_rfc3339()
        );
    }
    Ok(())
}

fn print_scan(report: &ScanReport) {
    println!();
    println!("=== Scan {} ({}) ===", report.run_at.format("%Y-%m-%d %H:%M:%S UTC"), report.classifier);
    for entry in &report.instruments {
        let line = match &entry.outcome {
            InstrumentOutcome::Emitted { signal } => format!(
                "{} @ {:.4} conf {:.2} stop {:.4} target {:.4}",
                signal.side, signal.price, signal.confidence, signal.stop_price, signal.target_price
            ),
            InstrumentOutcome::Suppressed { signal, previous } => format!(
                "suppressed {} (last {} at {})",
                signal.side,
                previous.side,
                previous.timestamp.to_rfc3339()
            ),
            InstrumentOutcome::Hold { decision } => format!("hold ({})", decision.label()),
            InstrumentOutcome::Rejected { reason } => format!("rejected: {reason}"),
        };
        println!("{:<14} {line}", entry.instrument);
    }
    println!("Emitted: {}", report.signals.len());
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Instrument:     {}", result.instrument);
    if let (Some(start), Some(end)) = (result.start_time, result.end_time) {
        println!("Period:         {} to {}", start.to_rfc3339(), end.to_rfc3339());
    }
    println!(
        "Bars:           {} ({} warmup)",
        result.bar_count, result.warmup_bars
    );
    println!(
        "Signals:        {} ({} emitted, {} suppressed)",
        result.signal_count,
        result.emitted_count,
        result.suppressed_count()
    );
    println!("Trades:         {}", m.trade_count);
    println!("Classifier:     {}", result.classifier);
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Annualized:     {:.2}%", m.annualized_return * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!("Commission:     {:.4}", m.total_commission);
    println!("Final Equity:   {:.2}", result.final_equity());
    if result.source == bandsentry_runner::DataSource::Synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}
