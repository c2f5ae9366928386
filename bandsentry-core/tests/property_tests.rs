//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Band ordering: lower <= middle <= upper on every snapshot
//! 2. Series shorter than the window produce no snapshots
//! 3. A bar never yields both a BUY and a SELL
//! 4. The backtest never holds more than one position at a time
//! 5. Heuristic confidence stays in [0, 1]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use bandsentry_core::backtest::{BacktestConfig, BacktestRunner, IntrabarPolicy};
use bandsentry_core::classifier::{
    breakout_confidence, FeatureVector, ScoringArtifact, SignalClassifier,
};
use bandsentry_core::domain::Bar;
use bandsentry_core::indicators::IndicatorCalculator;
use bandsentry_core::{BandZone, DecisionEngine, EngineConfig, IndicatorParams, SignalPipeline};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random walk of closes, kept positive.
fn arb_closes(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (
        10.0..500.0_f64,
        prop::collection::vec(-0.04..0.04_f64, min_len..max_len),
    )
        .prop_map(|(start, steps)| {
            let mut price = start;
            steps
                .into_iter()
                .map(|r| {
                    price = (price * (1.0 + r)).max(0.01);
                    price
                })
                .collect()
        })
}

fn arb_params() -> impl Strategy<Value = IndicatorParams> {
    (2usize..30, 0.0..3.5_f64, 1usize..20).prop_map(|(n, k, m)| IndicatorParams {
        bollinger_window: n,
        bollinger_k: k,
        atr_window: m,
    })
}

fn to_bars(closes: &[f64]) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let spread = close * 0.01;
            Bar {
                instrument: "PROP".into(),
                timestamp: base + Duration::minutes(30 * i as i64),
                open,
                high: open.max(close) + spread,
                low: (open.min(close) - spread).max(0.001),
                close,
                volume: 1.0,
            }
        })
        .collect()
}

// ── 1–2. Indicators ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn bands_are_ordered(closes in arb_closes(1, 120), params in arb_params()) {
        let bars = to_bars(&closes);
        let calc = IndicatorCalculator::new(params);
        for snap in calc.snapshots(&bars).flatten() {
            let tol = 1e-9 * snap.middle_band.abs().max(1.0);
            prop_assert!(snap.lower_band <= snap.middle_band + tol);
            prop_assert!(snap.middle_band <= snap.upper_band + tol);
            prop_assert!(snap.average_true_range >= 0.0);
        }
    }

    #[test]
    fn short_series_have_no_snapshots(params in arb_params(), len in 0usize..30) {
        let needed = params.bollinger_window.max(params.atr_window);
        let len = len.min(needed - 1);
        let closes: Vec<f64> = (0..len).map(|i| 100.0 + i as f64).collect();
        let bars = to_bars(&closes);
        let calc = IndicatorCalculator::new(params);
        prop_assert_eq!(calc.snapshots(&bars).count(), len);
        prop_assert_eq!(calc.snapshots(&bars).flatten().count(), 0);
    }

    #[test]
    fn first_snapshot_at_warmup_index(params in arb_params()) {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i % 3) as f64).collect();
        let bars = to_bars(&closes);
        let calc = IndicatorCalculator::new(params.clone());
        let first = calc.snapshots(&bars).position(|s| s.is_some());
        prop_assert_eq!(first, Some(params.warmup_bars()));
    }
}

// ── 3. Decisions ─────────────────────────────────────────────────────

proptest! {
    /// A zone is exactly one of Above, Below or Inside, so at most one side
    /// can come out of a bar.
    #[test]
    fn one_side_per_bar(closes in arb_closes(25, 150)) {
        let bars = to_bars(&closes);
        let config = EngineConfig::default();
        let pipeline = SignalPipeline::new(&config, SignalClassifier::heuristic()).unwrap();
        let calc = IndicatorCalculator::new(config.indicators.clone());
        let decisions = pipeline.decisions(&bars);
        prop_assert_eq!(decisions.len(), bars.len());

        for ((bar, snap), decision) in bars.iter().zip(calc.snapshots(&bars)).zip(&decisions) {
            if let Some(signal) = decision.signal() {
                let snap = snap.expect("signal without snapshot");
                let zone = DecisionEngine::zone(bar.close, &snap);
                prop_assert_ne!(zone, BandZone::Inside);
                prop_assert_eq!(zone.side(), Some(signal.side));
                prop_assert!(signal.confidence > config.decision.confidence_threshold);
            }
        }
    }

    #[test]
    fn heuristic_confidence_in_unit_range(closes in arb_closes(25, 80)) {
        let bars = to_bars(&closes);
        let calc = IndicatorCalculator::new(IndicatorParams::default());
        for (bar, snap) in bars.iter().zip(calc.snapshots(&bars)) {
            if let Some(snap) = snap {
                let c = breakout_confidence(bar, &snap);
                prop_assert!((0.0..=1.0).contains(&c));
            }
        }
    }
}

// ── 4. Backtest ──────────────────────────────────────────────────────

/// Scores every bar 1.0, so every band breach becomes a signal.
struct Certain;

impl ScoringArtifact for Certain {
    fn name(&self) -> &str {
        "certain"
    }

    fn score(&self, _features: &FeatureVector) -> f64 {
        1.0
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Trades never overlap: each entry comes at or after the previous exit.
    #[test]
    fn at_most_one_open_position(
        closes in arb_closes(60, 200),
        target_first in prop::bool::ANY,
        window in 5usize..25,
        k in 0.25..1.0_f64,
    ) {
        let bars = to_bars(&closes);
        let config = EngineConfig {
            indicators: IndicatorParams {
                bollinger_window: window,
                bollinger_k: k,
                ..IndicatorParams::default()
            },
            ..EngineConfig::default()
        };
        let classifier = SignalClassifier::with_artifact(Arc::new(Certain));
        let pipeline = SignalPipeline::new(&config, classifier).unwrap();
        let policy = if target_first { IntrabarPolicy::TargetFirst } else { IntrabarPolicy::StopFirst };
        let runner = BacktestRunner::new(
            pipeline,
            BacktestConfig { intrabar_policy: policy, ..BacktestConfig::default() },
        ).unwrap();
        let outcome = runner.run(&bars).unwrap();
        prop_assume!(outcome.trades.len() >= 2);

        prop_assert_eq!(outcome.equity_curve.len(), bars.len());
        prop_assert!(outcome.emitted_count <= outcome.signal_count);
        prop_assert!(outcome.trades.len() <= outcome.emitted_count);
        for pair in outcome.trades.windows(2) {
            prop_assert!(pair[1].entry_bar >= pair[0].exit_bar);
            prop_assert!(pair[1].entry_time >= pair[0].exit_time);
        }
        for trade in &outcome.trades {
            prop_assert!(trade.exit_bar >= trade.entry_bar);
            prop_assert!(trade.exit_price.is_finite());
        }
        prop_assert!(outcome.equity_curve.iter().all(|p| p.equity.is_finite()));

        // Equity ends at capital plus realized P&L: nothing is left open.
        let realized: f64 = outcome.trades.iter().map(|t| t.net_pnl).sum();
        let last = outcome.final_equity().unwrap();
        prop_assert!((last - (10_000.0 + realized)).abs() < 1e-6);
    }
}
