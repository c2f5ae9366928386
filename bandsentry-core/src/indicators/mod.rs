//! Streaming indicator implementations.
//!
//! Indicators are fed one bar at a time and return `None` until their rolling
//! window is full. Warmup is therefore distinct from a zero value. The
//! `IndicatorCalculator` in `snapshot` combines them into one snapshot per bar.

pub mod atr;
pub mod bollinger;
pub mod snapshot;

pub use atr::AverageTrueRange;
pub use bollinger::{BandValues, Bollinger};
pub use snapshot::{IndicatorCalculator, IndicatorSnapshot, SnapshotIter};

/// Fixed-capacity ring buffer for rolling-window statistics.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    buf: Vec<f64>,
    pos: usize,
    len: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "rolling window capacity must be >= 1");
        Self {
            buf: vec![0.0; capacity],
            pos: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        let cap = self.buf.len();
        self.buf[self.pos] = value;
        self.pos = (self.pos + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Values in insertion order, oldest first.
    ///
    /// Summation always runs in this order so the same inputs give the same
    /// floating-point result regardless of where the ring head sits.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let cap = self.buf.len();
        let start = if self.len < cap { 0 } else { self.pos };
        (0..self.len).map(move |i| self.buf[(start + i) % cap])
    }

    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len as f64
    }

    /// Population standard deviation (divide by N).
    pub fn std_pop(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.len as f64;
        var.sqrt()
    }
}

/// Create synthetic bars from close prices for testing.
///
/// Open = previous close (or close for the first bar), high = max(open, close) + 1.0,
/// low = min(open, close) - 1.0, 30-minute spacing.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                instrument: "TEST".to_string(),
                timestamp: base + chrono::Duration::minutes(30 * i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_fills_then_rolls() {
        let mut w = RollingWindow::new(3);
        w.push(1.0);
        w.push(2.0);
        assert!(!w.is_full());
        w.push(3.0);
        assert!(w.is_full());
        w.push(4.0);
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_approx(w.mean(), 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn std_pop_known_value() {
        let mut w = RollingWindow::new(4);
        for v in [2.0, 4.0, 4.0, 6.0] {
            w.push(v);
        }
        // mean 4, squared deviations 4+0+0+4 = 8, /4 = 2
        assert_approx(w.std_pop(), 2.0_f64.sqrt(), DEFAULT_EPSILON);
    }
}
