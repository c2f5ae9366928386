//! Live scan: evaluate the latest bar of every configured instrument.
//!
//! Instruments are independent and run in parallel on rayon. Each series is
//! validated, replayed through the shared pipeline, and the final bar's
//! decision goes through the duplicate suppressor. A bad series only rejects
//! its own instrument; a store failure fails the whole run.
//!
//! A scan only reads suppression state. Emitted signals are recorded by
//! [`LiveScanner::commit`] after the caller has written them out, so a failed
//! write leaves them to be emitted again on the next run.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use bandsentry_core::domain::{validate_series, Bar, LastSignalRecord, Signal};
use bandsentry_core::suppression::{DuplicateSuppressor, SignalStore, StoreError, SuppressionVerdict};
use bandsentry_core::{Decision, SignalPipeline};

use crate::data_loader::LoadError;
use crate::runner::classifier_label;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("signal state: {0}")]
    Store(#[from] StoreError),
}

/// What happened to one instrument in a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InstrumentOutcome {
    Emitted { signal: Signal },
    Suppressed { signal: Signal, previous: LastSignalRecord },
    /// No signal on the latest bar.
    Hold { decision: Decision },
    /// The series could not be loaded or failed validation.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub instrument: String,
    /// Timestamp of the evaluated bar, absent for rejected series.
    pub bar_time: Option<DateTime<Utc>>,
    pub outcome: InstrumentOutcome,
}

/// Result of one live run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_at: DateTime<Utc>,
    pub classifier: String,
    /// Emitted signals, in configured instrument order.
    pub signals: Vec<Signal>,
    /// One entry per configured instrument, same order.
    pub instruments: Vec<InstrumentReport>,
}

impl ScanReport {
    pub fn rejected(&self) -> impl Iterator<Item = (&str, &str)> {
        self.instruments.iter().filter_map(|r| match &r.outcome {
            InstrumentOutcome::Rejected { reason } => Some((r.instrument.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn suppressed_count(&self) -> usize {
        self.instruments
            .iter()
            .filter(|r| matches!(r.outcome, InstrumentOutcome::Suppressed { .. }))
            .count()
    }
}

pub struct LiveScanner<S: SignalStore> {
    pipeline: SignalPipeline,
    suppressor: DuplicateSuppressor<S>,
}

impl<S: SignalStore> LiveScanner<S> {
    pub fn new(pipeline: SignalPipeline, store: S) -> Self {
        Self {
            pipeline,
            suppressor: DuplicateSuppressor::new(store),
        }
    }

    pub fn store(&self) -> &S {
        self.suppressor.store()
    }

    /// Scan `instruments`, loading each series with `load`. Nothing is
    /// recorded until [`commit`](Self::commit).
    pub fn scan<F>(
        &self,
        instruments: &[String],
        run_at: DateTime<Utc>,
        load: F,
    ) -> Result<ScanReport, ScanError>
    where
        F: Fn(&str) -> Result<Vec<Bar>, LoadError> + Sync,
    {
        info!(instruments = instruments.len(), "scan started");

        let reports = instruments
            .par_iter()
            .map(|instrument| match load(instrument) {
                Ok(bars) => self.evaluate(instrument, &bars),
                Err(err) => Ok(rejected(instrument, err.to_string())),
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let signals: Vec<Signal> = reports
            .iter()
            .filter_map(|r| match &r.outcome {
                InstrumentOutcome::Emitted { signal } => Some(signal.clone()),
                _ => None,
            })
            .collect();

        let report = ScanReport {
            run_at,
            classifier: classifier_label(self.pipeline.classifier()),
            signals,
            instruments: reports,
        };
        info!(
            emitted = report.signals.len(),
            suppressed = report.suppressed_count(),
            rejected = report.rejected().count(),
            "scan finished"
        );
        Ok(report)
    }

    /// Record every emitted signal of `report` in the store.
    pub fn commit(&self, report: &ScanReport) -> Result<(), ScanError> {
        for signal in &report.signals {
            self.suppressor.commit(signal)?;
        }
        debug!(recorded = report.signals.len(), "scan committed");
        Ok(())
    }

    /// Evaluate one instrument's series.
    pub fn evaluate(&self, instrument: &str, bars: &[Bar]) -> Result<InstrumentReport, StoreError> {
        if let Err(err) = validate_series(bars) {
            return Ok(rejected(instrument, err.to_string()));
        }
        if let Some(first) = bars.first().filter(|b| b.instrument != instrument) {
            let reason = format!("series belongs to '{}'", first.instrument);
            return Ok(rejected(instrument, reason));
        }
        let Some(decision) = self.pipeline.latest_decision(bars) else {
            return Ok(rejected(instrument, "no bars".to_string()));
        };
        let bar_time = bars.last().map(|b| b.timestamp);

        let outcome = match decision {
            Decision::Signal(signal) => match self.suppressor.check(&signal)? {
                SuppressionVerdict::Emitted => {
                    info!(
                        instrument,
                        side = %signal.side,
                        price = signal.price,
                        confidence = signal.confidence,
                        stop = signal.stop_price,
                        target = signal.target_price,
                        "signal emitted"
                    );
                    InstrumentOutcome::Emitted { signal }
                }
                SuppressionVerdict::Suppressed { previous } => {
                    InstrumentOutcome::Suppressed { signal, previous }
                }
            },
            other => {
                debug!(instrument, decision = other.label(), "hold");
                InstrumentOutcome::Hold { decision: other }
            }
        };

        Ok(InstrumentReport {
            instrument: instrument.to_string(),
            bar_time,
            outcome,
        })
    }
}

fn rejected(instrument: &str, reason: String) -> InstrumentReport {
    warn!(instrument, %reason, "series rejected");
    InstrumentReport {
        instrument: instrument.to_string(),
        bar_time: None,
        outcome: InstrumentOutcome::Rejected { reason },
    }
}
