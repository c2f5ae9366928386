//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single instrument over one fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Input contract violations. A series that fails validation never reaches
/// the indicator calculator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {index} of '{instrument}' has a non-finite price")]
    NonFinitePrice { instrument: String, index: usize },
    #[error("bar {index} of '{instrument}' has a non-positive price")]
    NonPositivePrice { instrument: String, index: usize },
    #[error("bar {index} of '{instrument}' has high below low")]
    HighBelowLow { instrument: String, index: usize },
    #[error("bar {index} of '{instrument}' is not after {previous} (got {current})")]
    NonMonotonicTimestamp {
        instrument: String,
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    #[error("bar {index} belongs to '{found}', expected '{expected}'")]
    MixedInstruments {
        expected: String,
        found: String,
        index: usize,
    },
}

impl Bar {
    /// Returns true if every OHLC field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Check a single-instrument series against the input contract.
///
/// Every bar must carry finite, positive prices with high >= low, every bar
/// must belong to the same instrument, and timestamps must strictly increase.
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    let Some(first) = bars.first() else {
        return Ok(());
    };
    let instrument = &first.instrument;

    for (index, bar) in bars.iter().enumerate() {
        if &bar.instrument != instrument {
            return Err(BarError::MixedInstruments {
                expected: instrument.clone(),
                found: bar.instrument.clone(),
                index,
            });
        }
        if !bar.is_finite() {
            return Err(BarError::NonFinitePrice {
                instrument: instrument.clone(),
                index,
            });
        }
        if bar.open <= 0.0 || bar.high <= 0.0 || bar.low <= 0.0 || bar.close <= 0.0 {
            return Err(BarError::NonPositivePrice {
                instrument: instrument.clone(),
                index,
            });
        }
        if bar.high < bar.low {
            return Err(BarError::HighBelowLow {
                instrument: instrument.clone(),
                index,
            });
        }
        if index > 0 {
            let previous = bars[index - 1].timestamp;
            if bar.timestamp <= previous {
                return Err(BarError::NonMonotonicTimestamp {
                    instrument: instrument.clone(),
                    index,
                    previous,
                    current: bar.timestamp,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_bar(i: i64) -> Bar {
        Bar {
            instrument: "BTC-USD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::minutes(30 * i),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 12.5,
        }
    }

    #[test]
    fn nan_close_is_not_finite() {
        let mut bar = sample_bar(0);
        assert!(bar.is_finite());
        bar.close = f64::NAN;
        assert!(!bar.is_finite());
    }

    #[test]
    fn valid_series_passes() {
        let bars: Vec<Bar> = (0..5).map(sample_bar).collect();
        assert!(validate_series(&bars).is_ok());
        assert!(validate_series(&[]).is_ok());
    }

    #[test]
    fn rejects_infinite_price() {
        let mut bars: Vec<Bar> = (0..3).map(sample_bar).collect();
        bars[2].high = f64::INFINITY;
        assert!(matches!(
            validate_series(&bars),
            Err(BarError::NonFinitePrice { index: 2, .. })
        ));
    }

    #[test]
    fn rejects_repeated_timestamp() {
        let mut bars: Vec<Bar> = (0..3).map(sample_bar).collect();
        bars[2].timestamp = bars[1].timestamp;
        assert!(matches!(
            validate_series(&bars),
            Err(BarError::NonMonotonicTimestamp { index: 2, .. })
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        let mut bars: Vec<Bar> = (0..2).map(sample_bar).collect();
        bars[1].high = 90.0;
        assert!(matches!(
            validate_series(&bars),
            Err(BarError::HighBelowLow { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_zero_close() {
        let mut bars: Vec<Bar> = (0..2).map(sample_bar).collect();
        bars[0].close = 0.0;
        assert!(matches!(
            validate_series(&bars),
            Err(BarError::NonPositivePrice { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_mixed_instruments() {
        let mut bars: Vec<Bar> = (0..2).map(sample_bar).collect();
        bars[1].instrument = "ETH-USD".into();
        assert!(matches!(
            validate_series(&bars),
            Err(BarError::MixedInstruments { index: 1, .. })
        ));
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar(3);
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
