//! BacktestRunner: bar-by-bar replay with at most one open position.

use tracing::{debug, trace};

use super::exit::resolve_exit;
use super::{BacktestConfig, BacktestError, BacktestOutcome, EquityPoint};
use crate::config::ConfigError;
use crate::domain::{validate_series, Bar, ExitReason, Signal, SimulatedPosition, TradeRecord};
use crate::pipeline::SignalPipeline;
use crate::suppression::{DuplicateSuppressor, MemoryStore};

/// Open position plus the commission already paid to enter it.
#[derive(Debug, Clone)]
struct OpenPosition {
    position: SimulatedPosition,
    entry_commission: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestRunner {
    pipeline: SignalPipeline,
    config: BacktestConfig,
}

impl BacktestRunner {
    pub fn new(pipeline: SignalPipeline, config: BacktestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { pipeline, config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &SignalPipeline {
        &self.pipeline
    }

    fn commission(&self, price: f64) -> f64 {
        self.config.commission_rate * price * self.config.stake
    }

    fn open(&self, signal: &Signal, bar_index: usize) -> OpenPosition {
        OpenPosition {
            position: SimulatedPosition::open(signal, bar_index),
            entry_commission: self.commission(signal.price),
        }
    }

    fn close(
        &self,
        open: OpenPosition,
        bar_index: usize,
        bar: &Bar,
        exit_price: f64,
        exit_reason: ExitReason,
    ) -> TradeRecord {
        let OpenPosition {
            position,
            entry_commission,
        } = open;
        let stake = self.config.stake;
        let gross_pnl = (exit_price - position.entry_price) * position.side.sign() * stake;
        let commission = entry_commission + self.commission(exit_price);
        debug!(
            instrument = %position.instrument,
            side = %position.side,
            entry = position.entry_price,
            exit = exit_price,
            reason = exit_reason.as_str(),
            "closed simulated position"
        );
        TradeRecord {
            instrument: position.instrument,
            side: position.side,
            entry_bar: position.entry_bar,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            stop_price: position.stop_price,
            target_price: position.target_price,
            exit_bar: bar_index,
            exit_time: bar.timestamp,
            exit_price,
            exit_reason,
            stake,
            gross_pnl,
            commission,
            net_pnl: gross_pnl - commission,
            bars_held: bar_index - position.entry_bar,
        }
    }

    /// Replay `bars` (one instrument, oldest first).
    pub fn run(&self, bars: &[Bar]) -> Result<BacktestOutcome, BacktestError> {
        let Some(last_bar) = bars.last() else {
            return Err(BacktestError::NoBars);
        };
        validate_series(bars)?;

        let decisions = self.pipeline.decisions(bars);
        let suppressor = DuplicateSuppressor::new(MemoryStore::new());

        let mut open: Option<OpenPosition> = None;
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(bars.len());
        let mut realized = 0.0;
        let mut signal_count = 0;
        let mut emitted_count = 0;

        for (i, (bar, decision)) in bars.iter().zip(&decisions).enumerate() {
            // 1. Exits, never on the entry bar.
            if let Some(current) = open.take() {
                let fill = (current.position.entry_bar < i)
                    .then(|| resolve_exit(&current.position, bar, self.config.intrabar_policy))
                    .flatten();
                match fill {
                    Some(fill) => {
                        let trade = self.close(current, i, bar, fill.price, fill.reason);
                        realized += trade.net_pnl;
                        trades.push(trade);
                    }
                    None => open = Some(current),
                }
            }

            // 2. Signal.
            if let Some(signal) = decision.signal() {
                signal_count += 1;
                if suppressor.submit(signal)?.is_emitted() {
                    emitted_count += 1;
                    match open.take() {
                        Some(current) if current.position.side == signal.side.opposite() => {
                            let trade = self.close(current, i, bar, bar.close, ExitReason::Flip);
                            realized += trade.net_pnl;
                            trades.push(trade);
                            open = Some(self.open(signal, i));
                        }
                        Some(current) => {
                            trace!(instrument = %signal.instrument, "already positioned on this side");
                            open = Some(current);
                        }
                        None => open = Some(self.open(signal, i)),
                    }
                }
            }

            // 3. Mark to market.
            let unrealized = open.as_ref().map_or(0.0, |o| {
                o.position.unrealized_pnl(bar.close, self.config.stake) - o.entry_commission
            });
            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: self.config.initial_capital + realized + unrealized,
            });
        }

        if let Some(current) = open.take() {
            let last_index = bars.len() - 1;
            let trade = self.close(current, last_index, last_bar, last_bar.close, ExitReason::EndOfData);
            realized += trade.net_pnl;
            trades.push(trade);
            if let Some(point) = equity_curve.last_mut() {
                point.equity = self.config.initial_capital + realized;
            }
        }

        Ok(BacktestOutcome {
            instrument: last_bar.instrument.clone(),
            trades,
            equity_curve,
            signal_count,
            emitted_count,
        })
    }
}
