//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! The first bar has no previous close and uses high-low.
//! ATR here is the simple rolling mean of true range over the window.

use super::RollingWindow;
use crate::domain::Bar;

fn bar_true_range(bar: &Bar, prev_close: Option<f64>) -> f64 {
    let range = bar.high - bar.low;
    match prev_close {
        Some(pc) => range.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
        None => range,
    }
}

#[derive(Debug, Clone)]
pub struct AverageTrueRange {
    ranges: RollingWindow,
    prev_close: Option<f64>,
}

impl AverageTrueRange {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "ATR window must be >= 1");
        Self {
            ranges: RollingWindow::new(window),
            prev_close: None,
        }
    }

    /// Push the next bar. Returns `None` while the window is filling.
    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let tr = bar_true_range(bar, self.prev_close);
        self.prev_close = Some(bar.close);
        self.ranges.push(tr);
        self.ranges.is_full().then(|| self.ranges.mean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::{TimeZone, Utc};

    fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                instrument: "TEST".to_string(),
                timestamp: base + chrono::Duration::minutes(30 * i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 105-95 = 10
            (102.0, 108.0, 100.0, 106.0), // TR = max(8, |108-102|, |100-102|) = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = max(9, |107-106|, |98-106|) = 9
        ]);
        assert_approx(bar_true_range(&bars[0], None), 10.0, DEFAULT_EPSILON);
        assert_approx(bar_true_range(&bars[1], Some(102.0)), 8.0, DEFAULT_EPSILON);
        assert_approx(bar_true_range(&bars[2], Some(106.0)), 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, |115-100|, |108-100|) = 15
        ]);
        assert_approx(bar_true_range(&bars[1], Some(bars[0].close)), 15.0, DEFAULT_EPSILON);

        // A window of one reports the gap-aware range directly.
        let mut atr = AverageTrueRange::new(1);
        atr.update(&bars[0]);
        assert_approx(atr.update(&bars[1]).unwrap(), 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_window_3_is_rolling_mean() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = 6
        ]);
        let mut atr = AverageTrueRange::new(3);
        let out: Vec<Option<f64>> = bars.iter().map(|b| atr.update(b)).collect();
        assert!(out[0].is_none());
        assert!(out[1].is_none());
        assert_approx(out[2].unwrap(), 9.0, DEFAULT_EPSILON);
        assert_approx(out[3].unwrap(), 23.0 / 3.0, DEFAULT_EPSILON);
    }
}
