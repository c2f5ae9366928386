//! IndicatorCalculator: one optional snapshot per bar.
//!
//! The calculator is a lazy iterator adapter over a bar sequence. Item `i`
//! is the snapshot for bar `i`, or `None` while either rolling window is
//! still filling. Re-supplying the same bars restarts from a clean state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AverageTrueRange, Bollinger};
use crate::config::IndicatorParams;
use crate::domain::{Bar, Side};

/// Band and range statistics for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub middle_band: f64,
    pub upper_band: f64,
    pub lower_band: f64,
    /// (upper - lower) / middle.
    pub bandwidth: f64,
    pub average_true_range: f64,
}

impl IndicatorSnapshot {
    pub fn band_width(&self) -> f64 {
        self.upper_band - self.lower_band
    }

    /// The opposite band for a position on `side`: upper for BUY, lower for SELL.
    pub fn band_target(&self, side: Side) -> f64 {
        match side {
            Side::Buy => self.upper_band,
            Side::Sell => self.lower_band,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorCalculator {
    params: IndicatorParams,
}

impl IndicatorCalculator {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Lazily compute one `Option<IndicatorSnapshot>` per input bar.
    pub fn snapshots<'a, I>(&self, bars: I) -> SnapshotIter<I::IntoIter>
    where
        I: IntoIterator<Item = &'a Bar>,
    {
        SnapshotIter {
            bars: bars.into_iter(),
            bands: Bollinger::new(self.params.bollinger_window, self.params.bollinger_k),
            atr: AverageTrueRange::new(self.params.atr_window),
        }
    }
}

/// Iterator returned by [`IndicatorCalculator::snapshots`].
#[derive(Debug, Clone)]
pub struct SnapshotIter<I> {
    bars: I,
    bands: Bollinger,
    atr: AverageTrueRange,
}

impl<'a, I> Iterator for SnapshotIter<I>
where
    I: Iterator<Item = &'a Bar>,
{
    type Item = Option<IndicatorSnapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        let bar = self.bars.next()?;
        // Both indicators must see every bar, so update both before combining.
        let bands = self.bands.update(bar.close);
        let atr = self.atr.update(bar);
        Some(bands.zip(atr).map(|(bands, atr)| IndicatorSnapshot {
            timestamp: bar.timestamp,
            middle_band: bands.middle,
            upper_band: bands.upper,
            lower_band: bands.lower,
            bandwidth: bands.bandwidth(),
            average_true_range: atr,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bars.size_hint()
    }
}
