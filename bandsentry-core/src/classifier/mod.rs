//! Confidence classifier: "does this setup favour a directional move?"
//!
//! The classifier is a single capability chosen at startup: score with a
//! trained artifact when one loaded, otherwise fall back to the band-excess
//! heuristic. Callers only ever see `classify()`, so the decision engine does
//! not know which path produced the number.

pub mod heuristic;
pub mod model;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::Bar;
use crate::indicators::IndicatorSnapshot;

pub use heuristic::breakout_confidence;
pub use model::{ArtifactError, DecisionTree, ScoringModel, TreeNode};

/// Number of features the scoring artifact consumes.
pub const FEATURE_COUNT: usize = 4;

/// Deterministic feature vector derived from a bar and its snapshot.
///
/// Order: close, band position, bandwidth, ATR / close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_bar(bar: &Bar, snapshot: &IndicatorSnapshot) -> Self {
        let width = snapshot.band_width();
        let band_position = if width > 0.0 {
            ((bar.close - snapshot.lower_band) / width).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let atr_ratio = if bar.close != 0.0 {
            snapshot.average_true_range / bar.close
        } else {
            0.0
        };
        Self([bar.close, band_position, snapshot.bandwidth, atr_ratio])
    }

    pub fn close(&self) -> f64 {
        self.0[0]
    }

    pub fn band_position(&self) -> f64 {
        self.0[1]
    }

    pub fn bandwidth(&self) -> f64 {
        self.0[2]
    }

    pub fn atr_ratio(&self) -> f64 {
        self.0[3]
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }
}

/// Opaque trained scorer. One operation: features in, probability-like score out.
pub trait ScoringArtifact: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Raw score. The classifier clamps it into [0, 1].
    fn score(&self, features: &FeatureVector) -> f64;
}

/// Which path the classifier is running on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierMode {
    Model(String),
    Heuristic,
}

#[derive(Clone)]
pub struct SignalClassifier {
    artifact: Option<Arc<dyn ScoringArtifact>>,
}

impl std::fmt::Debug for SignalClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalClassifier")
            .field("mode", &self.mode())
            .finish()
    }
}

impl Default for SignalClassifier {
    fn default() -> Self {
        Self::heuristic()
    }
}

impl SignalClassifier {
    /// Heuristic-only classifier.
    pub fn heuristic() -> Self {
        Self { artifact: None }
    }

    pub fn with_artifact(artifact: Arc<dyn ScoringArtifact>) -> Self {
        Self {
            artifact: Some(artifact),
        }
    }

    /// Load a JSON scoring artifact, or fall back to the heuristic.
    ///
    /// Never fails: a missing path selects the heuristic silently, and an
    /// unreadable or invalid artifact selects it with a degraded-mode warning.
    pub fn from_artifact_path(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("no scoring artifact configured, using band-excess heuristic");
            return Self::heuristic();
        };
        match ScoringModel::from_path(path) {
            Ok(model) => {
                info!(path = %path.display(), model = model.kind(), "loaded scoring artifact");
                Self::with_artifact(Arc::new(model))
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "scoring artifact unavailable, running in degraded heuristic mode"
                );
                Self::heuristic()
            }
        }
    }

    pub fn mode(&self) -> ClassifierMode {
        match &self.artifact {
            Some(a) => ClassifierMode::Model(a.name().to_string()),
            None => ClassifierMode::Heuristic,
        }
    }

    /// Confidence in [0, 1] for this bar. Direction-agnostic.
    pub fn classify(&self, bar: &Bar, snapshot: &IndicatorSnapshot) -> f64 {
        if let Some(artifact) = &self.artifact {
            let features = FeatureVector::from_bar(bar, snapshot);
            let raw = artifact.score(&features);
            if raw.is_finite() {
                return raw.clamp(0.0, 1.0);
            }
            debug!(
                instrument = %bar.instrument,
                timestamp = %bar.timestamp,
                "artifact returned a non-finite score, using heuristic for this bar"
            );
        }
        breakout_confidence(bar, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct Constant(f64);

    impl ScoringArtifact for Constant {
        fn name(&self) -> &str {
            "constant"
        }
        fn score(&self, _features: &FeatureVector) -> f64 {
            self.0
        }
    }

    fn bar(close: f64) -> Bar {
        Bar {
            instrument: "BTC-USD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
        }
    }

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            middle_band: 100.0,
            upper_band: 104.0,
            lower_band: 96.0,
            bandwidth: 0.08,
            average_true_range: 2.0,
        }
    }

    #[test]
    fn feature_vector_layout() {
        let f = FeatureVector::from_bar(&bar(98.0), &snapshot());
        assert_eq!(f.close(), 98.0);
        assert!((f.band_position() - 0.25).abs() < 1e-12);
        assert_eq!(f.bandwidth(), 0.08);
        assert!((f.atr_ratio() - 2.0 / 98.0).abs() < 1e-12);
        assert_eq!(f.get(4), None);
    }

    #[test]
    fn band_position_is_clamped() {
        assert_eq!(FeatureVector::from_bar(&bar(110.0), &snapshot()).band_position(), 1.0);
        assert_eq!(FeatureVector::from_bar(&bar(90.0), &snapshot()).band_position(), 0.0);
    }

    #[test]
    fn degenerate_band_position_is_midpoint() {
        let mut snap = snapshot();
        snap.upper_band = 100.0;
        snap.lower_band = 100.0;
        assert_eq!(FeatureVector::from_bar(&bar(100.0), &snap).band_position(), 0.5);
    }

    #[test]
    fn artifact_score_is_clamped() {
        let high = SignalClassifier::with_artifact(Arc::new(Constant(1.7)));
        assert_eq!(high.classify(&bar(100.0), &snapshot()), 1.0);
        let low = SignalClassifier::with_artifact(Arc::new(Constant(-0.2)));
        assert_eq!(low.classify(&bar(100.0), &snapshot()), 0.0);
        assert_eq!(low.mode(), ClassifierMode::Model("constant".into()));
    }

    #[test]
    fn non_finite_score_uses_heuristic() {
        let classifier = SignalClassifier::with_artifact(Arc::new(Constant(f64::NAN)));
        let b = bar(106.0);
        assert_eq!(
            classifier.classify(&b, &snapshot()),
            breakout_confidence(&b, &snapshot())
        );
    }

    #[test]
    fn missing_path_selects_heuristic() {
        let classifier = SignalClassifier::from_artifact_path(None);
        assert_eq!(classifier.mode(), ClassifierMode::Heuristic);
    }

    #[test]
    fn unreadable_artifact_degrades_to_heuristic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();
        let classifier = SignalClassifier::from_artifact_path(Some(&path));
        assert_eq!(classifier.mode(), ClassifierMode::Heuristic);

        let missing = dir.path().join("absent.json");
        let classifier = SignalClassifier::from_artifact_path(Some(&missing));
        assert_eq!(classifier.mode(), ClassifierMode::Heuristic);
    }
}
