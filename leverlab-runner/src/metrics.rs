//! Performance metrics — pure functions that compute run statistics.
//!
//! Every metric is a pure function: daily equity curve and/or event tape
//! in, scalar out. No dependencies on the driver or data source.

use serde::{Deserialize, Serialize};

use leverlab_core::{ExitReason, LedgerEvent};

/// Aggregate performance metrics for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    /// Peak-to-trough drawdown in dollars (non-positive).
    pub max_drawdown_abs: f64,
    /// Peak-to-trough drawdown as a fraction of the peak (non-positive).
    pub max_drawdown_pct: f64,
    /// CAGR / |max drawdown|; 0 when either side is degenerate.
    pub mar: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub stop_count: usize,
    pub kill_switch_count: usize,
    pub mode_flip_exits: usize,
    pub skipped_bars: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from a daily (end-of-day) equity curve and the
    /// full event tape.
    pub fn compute(daily_equity: &[f64], events: &[LedgerEvent]) -> Self {
        let trading_days = daily_equity.len();
        let (dd_abs, dd_pct) = max_drawdown(daily_equity);
        let cagr = cagr(daily_equity, trading_days);
        Self {
            total_return: total_return(daily_equity),
            cagr,
            sharpe: sharpe_ratio(daily_equity, 0.0),
            max_drawdown_abs: dd_abs,
            max_drawdown_pct: dd_pct,
            mar: mar_ratio(cagr, dd_pct),
            win_rate: win_rate(events),
            profit_factor: profit_factor(events),
            trade_count: events.iter().filter(|e| e.realized_pnl().is_some()).count(),
            stop_count: count_stops(events),
            kill_switch_count: count_exits(events, ExitReason::KillSwitch),
            mode_flip_exits: count_exits(events, ExitReason::ModeFlip),
            skipped_bars: events
                .iter()
                .filter(|e| matches!(e, LedgerEvent::BarSkipped { .. }))
                .count(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let initial = equity[0];
    let last = equity[equity.len() - 1];
    if initial <= 0.0 {
        return 0.0;
    }
    (last - initial) / initial
}

/// Compound annual growth rate, assuming 252 trading days per year.
pub fn cagr(equity: &[f64], trading_days: usize) -> f64 {
    if equity.len() < 2 || trading_days < 2 {
        return 0.0;
    }
    let initial = equity[0];
    let last = equity[equity.len() - 1];
    if initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = trading_days as f64 / 252.0;
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily simple returns. Returns 0.0 when the
/// return variance is zero or fewer than two days exist.
pub fn sharpe_ratio(equity: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * (252.0_f64).sqrt()
}

/// Maximum peak-to-trough drawdown as (dollars, fraction of peak); both
/// non-positive, 0.0 for flat or rising curves.
pub fn max_drawdown(equity: &[f64]) -> (f64, f64) {
    if equity.len() < 2 {
        return (0.0, 0.0);
    }
    let mut peak = equity[0];
    let mut dd_abs = 0.0_f64;
    let mut dd_pct = 0.0_f64;
    for &point in equity {
        if point > peak {
            peak = point;
        }
        let abs = point - peak;
        if abs < dd_abs {
            dd_abs = abs;
        }
        if peak > 0.0 {
            let pct = abs / peak;
            if pct < dd_pct {
                dd_pct = pct;
            }
        }
    }
    (dd_abs, dd_pct)
}

/// MAR ratio: CAGR over the magnitude of the fractional max drawdown.
pub fn mar_ratio(cagr: f64, max_drawdown_pct: f64) -> f64 {
    if max_drawdown_pct >= 0.0 {
        return 0.0;
    }
    cagr / max_drawdown_pct.abs()
}

/// Fraction of realizations that closed with positive P&L.
pub fn win_rate(events: &[LedgerEvent]) -> f64 {
    let realized: Vec<f64> = events.iter().filter_map(|e| e.realized_pnl()).collect();
    if realized.is_empty() {
        return 0.0;
    }
    realized.iter().filter(|pnl| **pnl > 0.0).count() as f64 / realized.len() as f64
}

/// Gross profit over gross loss across all realizations. Returns infinity
/// when every realization was a win, 0.0 when there were none.
pub fn profit_factor(events: &[LedgerEvent]) -> f64 {
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    for pnl in events.iter().filter_map(|e| e.realized_pnl()) {
        if pnl > 0.0 {
            gross_profit += pnl;
        } else {
            gross_loss += -pnl;
        }
    }
    if gross_loss < 1e-12 {
        if gross_profit > 0.0 {
            return f64::INFINITY;
        }
        return 0.0;
    }
    gross_profit / gross_loss
}

fn count_stops(events: &[LedgerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, LedgerEvent::Stopped { .. }))
        .count()
}

fn count_exits(events: &[LedgerEvent], reason: ExitReason) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, LedgerEvent::Exited { reason: r, .. } if *r == reason))
        .count()
}

fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
