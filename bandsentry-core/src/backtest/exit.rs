//! Intrabar exit resolution for an open position.
//!
//! A bar whose range covers both the stop and the target is ambiguous: OHLC
//! does not say which level traded first. A gap settles it (the level the
//! open already sits beyond fills first, at the open); otherwise the
//! configured `IntrabarPolicy` decides.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, ExitReason, Side, SimulatedPosition};

/// Which level fills first when one bar touches both stop and target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrabarPolicy {
    /// Assume the adverse move came first.
    #[default]
    StopFirst,
    TargetFirst,
}

/// A resolved exit: why, and at what price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitFill {
    pub reason: ExitReason,
    pub price: f64,
}

/// Stop fill for this bar, if the stop was crossed.
fn stop_fill(position: &SimulatedPosition, bar: &Bar) -> Option<ExitFill> {
    let stop = position.stop_price;
    let price = match position.side {
        Side::Buy if bar.low <= stop => bar.open.min(stop),
        Side::Sell if bar.high >= stop => bar.open.max(stop),
        _ => return None,
    };
    Some(ExitFill {
        reason: ExitReason::StopLoss,
        price,
    })
}

/// Target fill for this bar, if the target was crossed.
fn target_fill(position: &SimulatedPosition, bar: &Bar) -> Option<ExitFill> {
    let target = position.target_price;
    let price = match position.side {
        Side::Buy if bar.high >= target => bar.open.max(target),
        Side::Sell if bar.low <= target => bar.open.min(target),
        _ => return None,
    };
    Some(ExitFill {
        reason: ExitReason::TakeProfit,
        price,
    })
}

fn opened_beyond(position: &SimulatedPosition, bar: &Bar, level: f64, adverse: bool) -> bool {
    // Adverse direction for a long is down, for a short is up.
    let down = matches!(position.side, Side::Buy) == adverse;
    if down {
        bar.open <= level
    } else {
        bar.open >= level
    }
}

/// Resolve the exit for `position` on `bar`, if any level was crossed.
pub fn resolve_exit(
    position: &SimulatedPosition,
    bar: &Bar,
    policy: IntrabarPolicy,
) -> Option<ExitFill> {
    match (stop_fill(position, bar), target_fill(position, bar)) {
        (None, None) => None,
        (Some(stop), None) => Some(stop),
        (None, Some(target)) => Some(target),
        (Some(stop), Some(target)) => {
            if opened_beyond(position, bar, position.stop_price, true) {
                Some(stop)
            } else if opened_beyond(position, bar, position.target_price, false) {
                Some(target)
            } else {
                match policy {
                    IntrabarPolicy::StopFirst => Some(stop),
                    IntrabarPolicy::TargetFirst => Some(target),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn position(side: Side) -> SimulatedPosition {
        let (stop, target) = match side {
            Side::Buy => (95.0, 105.0),
            Side::Sell => (105.0, 95.0),
        };
        SimulatedPosition {
            instrument: "BTC-USD".into(),
            side,
            entry_price: 100.0,
            stop_price: stop,
            target_price: target,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            entry_bar: 0,
        }
    }

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            instrument: "BTC-USD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn no_cross_no_exit() {
        let b = bar(100.0, 104.0, 96.0, 101.0);
        assert_eq!(resolve_exit(&position(Side::Buy), &b, IntrabarPolicy::StopFirst), None);
        assert_eq!(resolve_exit(&position(Side::Sell), &b, IntrabarPolicy::StopFirst), None);
    }

    #[test]
    fn long_stop_fills_at_level() {
        let b = bar(99.0, 100.0, 94.0, 96.0);
        let fill = resolve_exit(&position(Side::Buy), &b, IntrabarPolicy::StopFirst).unwrap();
        assert_eq!(fill.reason, ExitReason::StopLoss);
        assert_eq!(fill.price, 95.0);
    }

    #[test]
    fn short_target_fills_at_level() {
        let b = bar(99.0, 100.0, 94.0, 96.0);
        let fill = resolve_exit(&position(Side::Sell), &b, IntrabarPolicy::StopFirst).unwrap();
        assert_eq!(fill.reason, ExitReason::TakeProfit);
        assert_eq!(fill.price, 95.0);
    }

    #[test]
    fn gap_through_stop_fills_at_open() {
        let b = bar(92.0, 93.0, 90.0, 91.0);
        let fill = resolve_exit(&position(Side::Buy), &b, IntrabarPolicy::TargetFirst).unwrap();
        assert_eq!(fill.reason, ExitReason::StopLoss);
        assert_eq!(fill.price, 92.0);

        let b = bar(108.0, 110.0, 107.0, 109.0);
        let fill = resolve_exit(&position(Side::Sell), &b, IntrabarPolicy::StopFirst).unwrap();
        assert_eq!(fill.price, 108.0);
    }

    #[test]
    fn gap_through_target_fills_at_open() {
        let b = bar(107.0, 108.0, 106.0, 107.5);
        let fill = resolve_exit(&position(Side::Buy), &b, IntrabarPolicy::StopFirst).unwrap();
        assert_eq!(fill.reason, ExitReason::TakeProfit);
        assert_eq!(fill.price, 107.0);
    }

    #[test]
    fn both_touched_uses_policy() {
        let b = bar(100.0, 106.0, 94.0, 100.0);
        let stop_first = resolve_exit(&position(Side::Buy), &b, IntrabarPolicy::StopFirst).unwrap();
        assert_eq!(stop_first.reason, ExitReason::StopLoss);
        assert_eq!(stop_first.price, 95.0);

        let target_first =
            resolve_exit(&position(Side::Buy), &b, IntrabarPolicy::TargetFirst).unwrap();
        assert_eq!(target_first.reason, ExitReason::TakeProfit);
        assert_eq!(target_first.price, 105.0);

        let short = resolve_exit(&position(Side::Sell), &b, IntrabarPolicy::StopFirst).unwrap();
        assert_eq!(short.reason, ExitReason::StopLoss);
        assert_eq!(short.price, 105.0);
    }

    #[test]
    fn default_policy_is_stop_first() {
        assert_eq!(IntrabarPolicy::default(), IntrabarPolicy::StopFirst);
    }
}
