//! Reporting and export: JSON, CSV and Markdown artifacts plus live outputs.
//!
//! Backtest artifacts land in `<output_dir>/<run_id>/`:
//! - `<instrument>.json`: the full `BacktestResult`
//! - `<instrument>_trades.csv`: trade tape
//! - `<instrument>_equity.csv`: bar-by-bar equity curve
//! - `<instrument>_signals_history.csv`: per-bar bands, decision and trade marks
//! - `stats.csv`: one summary row per instrument
//! - `report.md`: human-readable summary
//!
//! Live runs write `signals.json` (latest emitted signals, removed when a run
//! emits nothing) and append one line per signal to the signal log.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use bandsentry_core::backtest::EquityPoint;
use bandsentry_core::domain::{Signal, TradeRecord};

use crate::data_loader::DataSource;
use crate::runner::{BacktestResult, HistoryRow, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: instrument, side, entry_bar, entry_time, entry_price, stop_price,
/// target_price, exit_bar, exit_time, exit_price, exit_reason, stake,
/// gross_pnl, commission, net_pnl, return_pct, bars_held
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "instrument",
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "stop_price",
        "target_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "stake",
        "gross_pnl",
        "commission",
        "net_pnl",
        "return_pct",
        "bars_held",
    ])?;

    for t in trades {
        wtr.write_record([
            t.instrument.as_str(),
            t.side.as_str(),
            &t.entry_bar.to_string(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.stop_price),
            &format!("{:.6}", t.target_price),
            &t.exit_bar.to_string(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            t.exit_reason.as_str(),
            &format!("{:.6}", t.stake),
            &format!("{:.4}", t.gross_pnl),
            &format!("{:.4}", t.commission),
            &format!("{:.4}", t.net_pnl),
            &format!("{:.6}", t.return_pct()),
            &t.bars_held.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "timestamp", "equity"])?;
    for (i, point) in equity_curve.iter().enumerate() {
        wtr.write_record([
            &i.to_string(),
            &point.timestamp.to_rfc3339(),
            &format!("{:.4}", point.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per bar. Indicator, confidence and signal columns stay empty where
/// the pipeline produced nothing; `band_target` is the opposite band.
pub fn export_signal_history_csv(history: &[HistoryRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "open",
        "high",
        "low",
        "close",
        "bb_lower",
        "bb_middle",
        "bb_upper",
        "atr",
        "confidence",
        "decision",
        "side",
        "stop",
        "target",
        "band_target",
        "entry",
        "exit",
    ])?;

    for row in history {
        let bar = &row.bar;
        let snap = row.evaluation.snapshot.as_ref();
        let signal = row.evaluation.decision.signal();
        wtr.write_record([
            bar.timestamp.to_rfc3339(),
            format!("{:.6}", bar.open),
            format!("{:.6}", bar.high),
            format!("{:.6}", bar.low),
            format!("{:.6}", bar.close),
            price_cell(snap.map(|s| s.lower_band)),
            price_cell(snap.map(|s| s.middle_band)),
            price_cell(snap.map(|s| s.upper_band)),
            price_cell(snap.map(|s| s.average_true_range)),
            row.evaluation
                .confidence
                .map_or_else(String::new, |c| format!("{c:.4}")),
            row.evaluation.decision.label().to_string(),
            signal.map_or_else(String::new, |s| s.side.as_str().to_string()),
            price_cell(signal.map(|s| s.stop_price)),
            price_cell(signal.map(|s| s.target_price)),
            price_cell(signal.zip(snap).map(|(s, snap)| snap.band_target(s.side))),
            u8::from(row.entry).to_string(),
            u8::from(row.exit).to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn price_cell(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| format!("{v:.6}"))
}

/// One summary row per instrument.
pub fn export_stats_csv(results: &[BacktestResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "instrument",
        "source",
        "bars",
        "signals",
        "emitted",
        "trades",
        "win_rate",
        "profit_factor",
        "total_return",
        "annualized_return",
        "max_drawdown",
        "sharpe",
        "net_pnl",
        "final_equity",
    ])?;
    for r in results {
        let m = &r.metrics;
        wtr.write_record([
            r.instrument.as_str(),
            match r.source {
                DataSource::Csv => "csv",
                DataSource::Synthetic => "synthetic",
            },
            &r.bar_count.to_string(),
            &r.signal_count.to_string(),
            &r.emitted_count.to_string(),
            &m.trade_count.to_string(),
            &format!("{:.4}", m.win_rate),
            &format!("{:.4}", m.profit_factor),
            &format!("{:.6}", m.total_return),
            &format!("{:.6}", m.annualized_return),
            &format!("{:.6}", m.max_drawdown),
            &format!("{:.4}", m.sharpe),
            &format!("{:.4}", m.net_pnl),
            &format!("{:.4}", r.final_equity()),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one run under `output_dir/<run_id>/`.
///
/// Returns the path to the run directory.
pub fn save_run(results: &[BacktestResult], output_dir: &Path) -> Result<PathBuf> {
    let Some(first) = results.first() else {
        bail!("no backtest results to save");
    };
    let run_dir = output_dir.join(&first.run_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    for result in results {
        let stem = file_stem(&result.instrument);
        write_file(&run_dir.join(format!("{stem}.json")), &export_json(result)?)?;
        write_file(
            &run_dir.join(format!("{stem}_trades.csv")),
            &export_trades_csv(&result.trades)?,
        )?;
        write_file(
            &run_dir.join(format!("{stem}_equity.csv")),
            &export_equity_csv(&result.equity_curve)?,
        )?;
        // Results reloaded from JSON carry no history.
        if !result.history.is_empty() {
            write_file(
                &run_dir.join(format!("{stem}_signals_history.csv")),
                &export_signal_history_csv(&result.history)?,
            )?;
        }
    }
    write_file(&run_dir.join("stats.csv"), &export_stats_csv(results)?)?;
    write_file(&run_dir.join("report.md"), &generate_report(results))?;

    Ok(run_dir)
}

/// Load one instrument's result from a run directory.
pub fn load_result(run_dir: &Path, instrument: &str) -> Result<BacktestResult> {
    let path = run_dir.join(format!("{}.json", file_stem(instrument)));
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn file_stem(instrument: &str) -> String {
    instrument
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(results: &[BacktestResult]) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str("# Backtest Report\n\n");
    if let Some(first) = results.first() {
        md.push_str(&format!("Run `{}`, classifier `{}`.\n\n", first.run_id, first.classifier));
    }

    md.push_str("| Instrument | Bars | Signals | Emitted | Trades | Win Rate | Return | Max DD | Sharpe |\n");
    md.push_str("| --- | --- | --- | --- | --- | --- | --- | --- | --- |\n");
    for r in results {
        let m = &r.metrics;
        md.push_str(&format!(
            "| {}{} | {} | {} | {} | {} | {:.1}% | {:.2}% | {:.2}% | {:.3} |\n",
            r.instrument,
            if r.source == DataSource::Synthetic {
                " (synthetic)"
            } else {
                ""
            },
            r.bar_count,
            r.signal_count,
            r.emitted_count,
            m.trade_count,
            m.win_rate * 100.0,
            m.total_return * 100.0,
            m.max_drawdown * 100.0,
            m.sharpe,
        ));
    }
    md
}

// ─── Live outputs ───────────────────────────────────────────────────

/// Write the emitted signals of a live run, or remove a stale file when the
/// run emitted nothing.
pub fn write_signals(path: &Path, signals: &[Signal]) -> Result<()> {
    if signals.is_empty() {
        return match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        };
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(signals).context("failed to serialize signals")?;
    let tmp = path.with_extension("json.tmp");
    write_file(&tmp, &json)?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move signals into {}", path.display()))
}

/// `2024-09-01 15:30:00 UTC | BTC-USD | SELL | $110.0000`
pub fn format_signal_line(logged_at: DateTime<Utc>, signal: &Signal) -> String {
    format!(
        "{} | {} | {} | ${:.4}",
        logged_at.format("%Y-%m-%d %H:%M:%S UTC"),
        signal.instrument,
        signal.side,
        signal.price
    )
}

/// Append one line per signal to the human-readable log.
pub fn append_signal_log(path: &Path, logged_at: DateTime<Utc>, signals: &[Signal]) -> Result<()> {
    if signals.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    for signal in signals {
        writeln!(file, "{}", format_signal_line(logged_at, signal))
            .with_context(|| format!("failed to append to {}", path.display()))?;
    }
    Ok(())
}
