//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, window)
//! - Upper: middle + k * stddev(close, window)
//! - Lower: middle - k * stddev(close, window)
//!
//! Uses population stddev (divide by N). First value after `window` closes.

use super::RollingWindow;

/// One bar's band values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandValues {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BandValues {
    /// (upper - lower) / middle. Zero when middle is zero.
    pub fn bandwidth(&self) -> f64 {
        if self.middle == 0.0 {
            return 0.0;
        }
        (self.upper - self.lower) / self.middle
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    closes: RollingWindow,
    k: f64,
}

impl Bollinger {
    pub fn new(window: usize, k: f64) -> Self {
        assert!(window >= 1, "Bollinger window must be >= 1");
        assert!(k >= 0.0 && k.is_finite(), "Bollinger multiplier must be finite and >= 0");
        Self {
            closes: RollingWindow::new(window),
            k,
        }
    }

    /// Push the next close. Returns `None` while the window is filling.
    pub fn update(&mut self, close: f64) -> Option<BandValues> {
        self.closes.push(close);
        if !self.closes.is_full() {
            return None;
        }
        let middle = self.closes.mean();
        let width = self.k * self.closes.std_pop();
        Some(BandValues {
            upper: middle + width,
            middle,
            lower: middle - width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    fn run(window: usize, k: f64, closes: &[f64]) -> Vec<Option<BandValues>> {
        let mut bb = Bollinger::new(window, k);
        closes.iter().map(|&c| bb.update(c)).collect()
    }

    #[test]
    fn middle_is_sma() {
        let out = run(3, 2.0, &[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert!(out[0].is_none());
        assert!(out[1].is_none());
        assert_approx(out[2].unwrap().middle, 11.0, DEFAULT_EPSILON);
        assert_approx(out[3].unwrap().middle, 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bands_symmetric() {
        let out = run(3, 2.0, &[10.0, 11.0, 12.0, 13.0, 14.0]);
        for bands in out.into_iter().flatten() {
            assert_approx(bands.upper - bands.middle, bands.middle - bands.lower, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn known_width() {
        // closes 10, 11, 12: mean 11, population var 2/3
        let out = run(3, 2.0, &[10.0, 11.0, 12.0]);
        let bands = out[2].unwrap();
        let std = (2.0_f64 / 3.0).sqrt();
        assert_approx(bands.upper, 11.0 + 2.0 * std, DEFAULT_EPSILON);
        assert_approx(bands.lower, 11.0 - 2.0 * std, DEFAULT_EPSILON);
        assert_approx(bands.bandwidth(), 4.0 * std / 11.0, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_price_zero_width() {
        let out = run(3, 2.0, &[100.0, 100.0, 100.0, 100.0]);
        let bands = out[3].unwrap();
        assert_approx(bands.upper, 100.0, DEFAULT_EPSILON);
        assert_approx(bands.lower, 100.0, DEFAULT_EPSILON);
        assert_eq!(bands.bandwidth(), 0.0);
    }

    #[test]
    #[should_panic(expected = "Bollinger window must be >= 1")]
    fn rejects_zero_window() {
        Bollinger::new(0, 2.0);
    }
}
