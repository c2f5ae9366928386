//! Bar loading for the runner.
//!
//! Given an instrument, resolves bars with this fallback policy:
//! 1. `<data_dir>/<instrument>.csv` exists → parse it
//! 2. No file and `synthetic` enabled → generate a deterministic random walk
//! 3. Otherwise → fail with a clear error
//!
//! CSV columns: `timestamp,open,high,low,close,volume`. Timestamps may be
//! RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or integer unix seconds. Rows are
//! returned in file order; series validation happens in the core.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use bandsentry_core::domain::Bar;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no bar file for '{instrument}' at {path} (enable data.synthetic for synthetic bars)")]
    NotFound { instrument: String, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} row {row}: unrecognised timestamp '{value}'")]
    Timestamp {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("{path} contains no bars")]
    Empty { path: PathBuf },
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv,
    Synthetic,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub data_dir: PathBuf,
    /// Generate synthetic bars when no CSV file exists.
    pub synthetic: bool,
    pub synthetic_bars: usize,
    pub interval_minutes: u32,
    /// Timestamp of the last synthetic bar.
    pub synthetic_end: DateTime<Utc>,
}

/// Bars for one instrument plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub instrument: String,
    pub bars: Vec<Bar>,
    pub source: DataSource,
    /// BLAKE3 over the bar data, for fingerprinting results.
    pub dataset_hash: String,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

pub fn csv_path(data_dir: &Path, instrument: &str) -> PathBuf {
    data_dir.join(format!("{instrument}.csv"))
}

/// Load one instrument according to the fallback policy.
pub fn load_instrument(instrument: &str, opts: &LoadOptions) -> Result<LoadedSeries, LoadError> {
    let path = csv_path(&opts.data_dir, instrument);
    let (bars, source) = if path.exists() {
        (load_csv(&path, instrument)?, DataSource::Csv)
    } else if opts.synthetic {
        warn!(instrument, "no bar file, generating synthetic bars");
        let bars = generate_synthetic_bars(
            instrument,
            opts.synthetic_end,
            opts.synthetic_bars,
            opts.interval_minutes,
        );
        (bars, DataSource::Synthetic)
    } else {
        return Err(LoadError::NotFound {
            instrument: instrument.to_string(),
            path,
        });
    };

    debug!(instrument, bars = bars.len(), ?source, "loaded bars");
    Ok(LoadedSeries {
        instrument: instrument.to_string(),
        dataset_hash: dataset_hash(&bars),
        bars,
        source,
    })
}

/// Parse a bar CSV file for `instrument`.
pub fn load_csv(path: &Path, instrument: &str) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut bars = Vec::new();
    for (row, record) in reader.deserialize::<CsvRow>().enumerate() {
        let record = record.map_err(csv_err)?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            row: row + 1,
            value: record.timestamp.clone(),
        })?;
        bars.push(Bar {
            instrument: instrument.to_string(),
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(bars)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Deterministic BLAKE3 hash over timestamps and OHLCV values.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.instrument.as_bytes());
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Random-walk bars for demos and offline runs.
///
/// Seeded from the instrument name, so the same instrument always gets the
/// same walk. The last bar is stamped `end`; earlier bars step back by
/// `interval_minutes`.
pub fn generate_synthetic_bars(
    instrument: &str,
    end: DateTime<Utc>,
    count: usize,
    interval_minutes: u32,
) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(instrument.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let minutes = i64::from(interval_minutes.max(1));
    let start = end - Duration::minutes(minutes * count.saturating_sub(1) as i64);
    let mut price = rng.gen_range(20.0..2_000.0_f64);

    (0..count)
        .map(|i| {
            let bar_return: f64 = rng.gen_range(-0.012..0.012);
            let open = price;
            let close = price * (1.0 + bar_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.004));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.004));
            price = close;
            Bar {
                instrument: instrument.to_string(),
                timestamp: start + Duration::minutes(minutes * i as i64),
                open,
                high,
                low,
                close,
                volume: rng.gen_range(10.0..5_000.0),
            }
        })
        .collect()
}
