//! Band-excess fallback used when no trained artifact is available.

use crate::domain::Bar;
use crate::indicators::IndicatorSnapshot;

/// Confidence from how far the close sits outside the bands.
///
/// `excess / half_width`, clamped to [0, 1], where excess is the distance
/// beyond the nearer band (0 inside) and half_width is (upper - lower) / 2.
/// A collapsed band gives 0.
pub fn breakout_confidence(bar: &Bar, snapshot: &IndicatorSnapshot) -> f64 {
    let half_width = snapshot.band_width() / 2.0;
    if half_width <= 0.0 {
        return 0.0;
    }
    let excess = (bar.close - snapshot.upper_band)
        .max(snapshot.lower_band - bar.close)
        .max(0.0);
    (excess / half_width).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(close: f64) -> Bar {
        Bar {
            instrument: "GALA-USD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn snapshot(lower: f64, upper: f64) -> IndicatorSnapshot {
        let middle = (lower + upper) / 2.0;
        IndicatorSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            middle_band: middle,
            upper_band: upper,
            lower_band: lower,
            bandwidth: (upper - lower) / middle,
            average_true_range: 1.0,
        }
    }

    #[test]
    fn inside_bands_is_zero() {
        assert_eq!(breakout_confidence(&bar(100.0), &snapshot(96.0, 104.0)), 0.0);
        assert_eq!(breakout_confidence(&bar(104.0), &snapshot(96.0, 104.0)), 0.0);
    }

    #[test]
    fn scales_with_excess_above() {
        // half width 4, excess 2
        assert_eq!(breakout_confidence(&bar(106.0), &snapshot(96.0, 104.0)), 0.5);
    }

    #[test]
    fn scales_with_excess_below() {
        // half width 4, excess 3
        assert_eq!(breakout_confidence(&bar(93.0), &snapshot(96.0, 104.0)), 0.75);
    }

    #[test]
    fn saturates_at_one() {
        assert_eq!(breakout_confidence(&bar(150.0), &snapshot(96.0, 104.0)), 1.0);
    }

    #[test]
    fn collapsed_band_is_zero() {
        assert_eq!(breakout_confidence(&bar(120.0), &snapshot(100.0, 100.0)), 0.0);
    }
}
