//! Band-breach decision rule with ATR-sized stop and target.
//!
//! Stateless per bar: a close at or beyond a band, backed by confidence
//! strictly above the threshold, becomes a `Signal`. Every other outcome is a
//! HOLD, and the `Decision` variant records which reason applied.

use serde::{Deserialize, Serialize};

use crate::config::DecisionParams;
use crate::domain::{Bar, Side, Signal};
use crate::indicators::IndicatorSnapshot;

/// Relative band width below which the bands are treated as collapsed.
const DEGENERATE_BAND_EPSILON: f64 = 1e-12;

/// Where the close sits relative to the bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandZone {
    /// close >= upper band.
    Above,
    /// close <= lower band.
    Below,
    Inside,
}

impl BandZone {
    /// Side a breach in this zone trades, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Self::Above => Some(Side::Sell),
            Self::Below => Some(Side::Buy),
            Self::Inside => None,
        }
    }
}

/// Outcome of evaluating one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// No snapshot yet for this bar.
    InsufficientHistory,
    InsideBands { confidence: f64 },
    /// The band was breached but confidence did not clear the threshold.
    LowConfidence { zone: BandZone, confidence: f64 },
    Signal(Signal),
}

impl Decision {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Self::Signal(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn into_signal(self) -> Option<Signal> {
        match self {
            Self::Signal(signal) => Some(signal),
            _ => None,
        }
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InsufficientHistory => "insufficient_history",
            Self::InsideBands { .. } => "inside_bands",
            Self::LowConfidence { .. } => "low_confidence",
            Self::Signal(_) => "signal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    params: DecisionParams,
}

impl DecisionEngine {
    pub fn new(params: DecisionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DecisionParams {
        &self.params
    }

    /// Classify the close against the bands.
    ///
    /// Collapsed bands (a flat window) are `Inside`, so a close can never sit
    /// in both breach zones at once.
    pub fn zone(close: f64, snapshot: &IndicatorSnapshot) -> BandZone {
        let width = snapshot.band_width();
        if width <= DEGENERATE_BAND_EPSILON * snapshot.middle_band.abs() {
            return BandZone::Inside;
        }
        if close >= snapshot.upper_band {
            BandZone::Above
        } else if close <= snapshot.lower_band {
            BandZone::Below
        } else {
            BandZone::Inside
        }
    }

    /// Evaluate one bar.
    ///
    /// `snapshot` and `confidence` are `None` during warmup. Either missing
    /// yields `InsufficientHistory`.
    pub fn evaluate(
        &self,
        bar: &Bar,
        snapshot: Option<&IndicatorSnapshot>,
        confidence: Option<f64>,
    ) -> Decision {
        let (Some(snapshot), Some(confidence)) = (snapshot, confidence) else {
            return Decision::InsufficientHistory;
        };

        let zone = Self::zone(bar.close, snapshot);
        let Some(side) = zone.side() else {
            return Decision::InsideBands { confidence };
        };
        if confidence <= self.params.confidence_threshold {
            return Decision::LowConfidence { zone, confidence };
        }

        let offset = snapshot.average_true_range * self.params.atr_multiplier;
        Decision::Signal(Signal {
            instrument: bar.instrument.clone(),
            timestamp: bar.timestamp,
            side,
            price: bar.close,
            confidence,
            stop_price: bar.close - side.sign() * offset,
            target_price: bar.close + side.sign() * offset,
        })
    }
}
