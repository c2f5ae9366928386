//! Application configuration loaded from TOML.
//!
//! Every section is optional and falls back to its defaults:
//!
//! ```toml
//! [indicators]
//! bollinger_window = 20
//! bollinger_k = 2.0
//! atr_window = 14
//!
//! [decision]
//! confidence_threshold = 0.5
//! atr_multiplier = 1.5
//!
//! [classifier]
//! artifact = "models/breakout.json"
//!
//! [backtest]
//! initial_capital = 10000.0
//! stake = 1.0
//! commission_rate = 0.0
//! intrabar_policy = "stop_first"
//! interval_minutes = 30
//! output_dir = "runs"
//!
//! [live]
//! instruments = ["BTC-USD", "ETH-USD"]
//! state_path = "state.json"
//! signals_path = "signals.json"
//! signal_log_path = "signals.log"
//!
//! [data]
//! dir = "data"
//! synthetic = false
//! synthetic_bars = 500
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandsentry_core::backtest::BacktestConfig;
use bandsentry_core::{DecisionParams, EngineConfig, IndicatorParams};

/// Unique identifier for a configuration (content-addressable hash).
pub type RunId = String;

const MINUTES_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] bandsentry_core::ConfigError),
    #[error("failed to fingerprint config: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// JSON scoring artifact. Absent means heuristic-only.
    pub artifact: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    #[serde(flatten)]
    pub simulation: BacktestConfig,
    /// Bar interval, used to annualize returns.
    pub interval_minutes: u32,
    /// Parent directory for per-run exports.
    pub output_dir: PathBuf,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            simulation: BacktestConfig::default(),
            interval_minutes: 30,
            output_dir: PathBuf::from("runs"),
        }
    }
}

impl BacktestSection {
    /// Bars per calendar year. Crypto markets trade around the clock.
    pub fn bars_per_year(&self) -> f64 {
        MINUTES_PER_YEAR / f64::from(self.interval_minutes.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSection {
    pub instruments: Vec<String>,
    /// Last-signal state, one record per instrument.
    pub state_path: PathBuf,
    /// Emitted signals of the latest run. Removed when a run emits nothing.
    pub signals_path: PathBuf,
    /// Append-only human-readable log of emitted signals.
    pub signal_log_path: PathBuf,
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            instruments: vec!["BTC-USD".into(), "ETH-USD".into(), "SOL-USD".into()],
            state_path: PathBuf::from("state.json"),
            signals_path: PathBuf::from("signals.json"),
            signal_log_path: PathBuf::from("signals.log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Directory holding `<instrument>.csv` bar files.
    pub dir: PathBuf,
    /// Generate synthetic bars for instruments with no CSV file.
    pub synthetic: bool,
    pub synthetic_bars: usize,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            synthetic: false,
            synthetic_bars: 500,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub indicators: IndicatorParams,
    pub decision: DecisionParams,
    pub classifier: ClassifierSection,
    pub backtest: BacktestSection,
    pub live: LiveSection,
    pub data: DataSection,
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_config().validate()?;
        self.backtest.simulation.validate()?;
        if self.backtest.interval_minutes == 0 {
            return Err(bandsentry_core::ConfigError::ZeroWindow {
                field: "backtest.interval_minutes",
                value: 0,
            }
            .into());
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            indicators: self.indicators.clone(),
            decision: self.decision.clone(),
        }
    }

    /// Deterministic hash of everything that affects decisions and the
    /// simulation. Paths of the live section are excluded, so moving the
    /// state file does not change the id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let fingerprint = serde_json::to_string(&(
            &self.indicators,
            &self.decision,
            &self.classifier,
            &self.backtest.simulation,
            self.backtest.interval_minutes,
        ))?;
        Ok(blake3::hash(fingerprint.as_bytes()).to_hex().to_string())
    }
}
