//! Bars → snapshots → confidence → decisions.
//!
//! The live scanner and the backtest replay both go through `SignalPipeline`,
//! so identical bars always produce identical decisions on either path.

use crate::classifier::SignalClassifier;
use crate::config::{ConfigError, EngineConfig};
use crate::decision::{Decision, DecisionEngine};
use crate::domain::Bar;
use crate::indicators::{IndicatorCalculator, IndicatorSnapshot};

/// Everything the pipeline computed for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarEvaluation {
    pub snapshot: Option<IndicatorSnapshot>,
    /// Absent during warmup, when the classifier does not run.
    pub confidence: Option<f64>,
    pub decision: Decision,
}

#[derive(Debug, Clone)]
pub struct SignalPipeline {
    calculator: IndicatorCalculator,
    classifier: SignalClassifier,
    engine: DecisionEngine,
}

impl SignalPipeline {
    pub fn new(config: &EngineConfig, classifier: SignalClassifier) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            calculator: IndicatorCalculator::new(config.indicators.clone()),
            classifier,
            engine: DecisionEngine::new(config.decision.clone()),
        })
    }

    pub fn classifier(&self) -> &SignalClassifier {
        &self.classifier
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// One decision per bar. The classifier only runs on bars with a snapshot.
    pub fn decisions(&self, bars: &[Bar]) -> Vec<Decision> {
        self.evaluations(bars)
            .into_iter()
            .map(|e| e.decision)
            .collect()
    }

    /// Like [`decisions`](Self::decisions), keeping the snapshot and
    /// confidence behind each decision.
    pub fn evaluations(&self, bars: &[Bar]) -> Vec<BarEvaluation> {
        bars.iter()
            .zip(self.calculator.snapshots(bars))
            .map(|(bar, snapshot)| {
                let confidence = snapshot
                    .as_ref()
                    .map(|snap| self.classifier.classify(bar, snap));
                BarEvaluation {
                    decision: self.engine.evaluate(bar, snapshot.as_ref(), confidence),
                    snapshot,
                    confidence,
                }
            })
            .collect()
    }

    /// Decision for the final bar, or `None` for an empty series.
    ///
    /// The rolling windows still see every bar, so this matches the last
    /// element of [`decisions`](Self::decisions).
    pub fn latest_decision(&self, bars: &[Bar]) -> Option<Decision> {
        let bar = bars.last()?;
        let snapshot = self.calculator.snapshots(bars).last().flatten();
        let confidence = snapshot
            .as_ref()
            .map(|snap| self.classifier.classify(bar, snap));
        Some(self.engine.evaluate(bar, snapshot.as_ref(), confidence))
    }
}
