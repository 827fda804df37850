//! Backtest driver — wires the strategy engine, equity ledger, and metrics
//! into a single per-bar loop.
//!
//! The loop owns the two feedback paths the pure components cannot see on
//! their own: forced end-of-day flattening when the calendar day changes,
//! and realized-P&L feedback into the strategy state so the kill switch can
//! observe ledger outcomes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chrono::{NaiveDate, NaiveDateTime};
use leverlab_core::{
    EquityLedger, LedgerError, LedgerEvent, MarketBar, StepError, StrategyEngine, StrategyState,
};

use crate::config::{ConfigError, RunConfig};
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("strategy step failed: {0}")]
    Step(#[from] StepError),
    #[error("ledger rejected bar: {0}")]
    Ledger(#[from] LedgerError),
    #[error("no bars to run")]
    NoBars,
}

/// Marked equity at one bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Realized equity at one session close.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run_id: String,
    pub metrics: PerformanceMetrics,
    /// Per-bar marked equity.
    pub equity_curve: Vec<EquityPoint>,
    /// End-of-day realized equity, initial capital first.
    pub daily_equity: Vec<DailyPoint>,
    pub events: Vec<LedgerEvent>,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub bar_count: usize,
    pub skipped_bars: usize,
}

/// Runs the strategy over a time-ordered bar stream.
///
/// Bars spanning multiple days get a forced flat at each day's last bar;
/// the stream's final bar always closes the book.
pub fn run_backtest(bars: &[MarketBar], config: &RunConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    if bars.is_empty() {
        return Err(RunError::NoBars);
    }

    let engine = StrategyEngine::new(config.strategy.clone()).map_err(ConfigError::from)?;
    let mut ledger = EquityLedger::new(config.ledger.clone(), config.initial_capital)
        .map_err(ConfigError::from)?;
    let mut state = StrategyState::new();

    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut daily_equity = vec![DailyPoint {
        date: bars[0].day(),
        equity: config.initial_capital,
    }];
    let mut events: Vec<LedgerEvent> = Vec::new();
    let mut skipped = 0usize;
    let mut prev_bar: Option<&MarketBar> = None;

    for bar in bars {
        // Forced flat at each session close before the next day's first bar.
        if let Some(prev) = prev_bar {
            if prev.day() != bar.day() {
                let closes = ledger.close_end_of_day(prev);
                record_realizations(&mut state, &ledger, &closes);
                events.extend(closes);
                daily_equity.push(DailyPoint {
                    date: prev.day(),
                    equity: ledger.cash_equity(),
                });
            }
        }

        let decision = engine.step(&mut state, bar)?;
        let bar_events = ledger.apply(&decision, bar)?;
        record_realizations(&mut state, &ledger, &bar_events);
        for event in &bar_events {
            if event.is_warning() {
                skipped += 1;
                tracing::warn!(timestamp = %event.timestamp(), event = ?event, "bar skipped");
            }
        }
        events.extend(bar_events);

        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: ledger.marked_equity(bar),
        });
        prev_bar = Some(bar);
    }

    if let Some(last) = prev_bar {
        let closes = ledger.close_end_of_day(last);
        record_realizations(&mut state, &ledger, &closes);
        events.extend(closes);
        daily_equity.push(DailyPoint {
            date: last.day(),
            equity: ledger.cash_equity(),
        });
    }

    let daily_curve: Vec<f64> = daily_equity.iter().map(|p| p.equity).collect();
    let metrics = PerformanceMetrics::compute(&daily_curve, &events);

    Ok(BacktestResult {
        run_id: config.run_id(),
        metrics,
        equity_curve,
        daily_equity,
        events,
        initial_capital: config.initial_capital,
        final_equity: ledger.cash_equity(),
        bar_count: bars.len(),
        skipped_bars: skipped,
    })
}

/// Feeds realized P&L back into the strategy state as a fraction of
/// day-start equity, which is what the kill switch thresholds against.
fn record_realizations(state: &mut StrategyState, ledger: &EquityLedger, events: &[LedgerEvent]) {
    let day_start = ledger.day_start_equity();
    if !(day_start > 0.0) {
        return;
    }
    for event in events {
        if let Some(pnl) = event.realized_pnl() {
            state.record_realized(pnl / day_start);
        }
    }
}
