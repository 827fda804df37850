//! StrategyState — the decision state threaded through successive `step` calls.

use super::mode::Mode;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Mutable decision state owned by the caller.
///
/// The position fraction is private: every write goes through
/// [`set_position_fraction`](Self::set_position_fraction), which clamps to
/// [0, 1]. The engine additionally zeroes it whenever the mode is neutral or
/// trading is disabled, so the invariant
/// `position_fraction == 0.0 if mode == Neutral || !trading_enabled`
/// holds after every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    pub mode: Mode,
    position_fraction: f64,
    pub trading_enabled: bool,
    /// Return-fraction realized since day start. Reset at the day boundary.
    pub daily_pnl: f64,
    pub current_day: Option<NaiveDate>,
    /// Monotonicity guard: bars must arrive in strictly increasing order.
    pub last_timestamp: Option<NaiveDateTime>,
}

impl StrategyState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Neutral,
            position_fraction: 0.0,
            trading_enabled: true,
            daily_pnl: 0.0,
            current_day: None,
            last_timestamp: None,
        }
    }

    pub fn position_fraction(&self) -> f64 {
        self.position_fraction
    }

    /// Set the authorized exposure fraction, clamped to [0, 1].
    /// NaN collapses to 0 rather than poisoning downstream sizing.
    pub fn set_position_fraction(&mut self, fraction: f64) {
        self.position_fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
    }

    /// Accumulate a realized P&L fraction into the daily tally.
    /// Fed back by the driver after every ledger realization event.
    pub fn record_realized(&mut self, pnl_fraction: f64) {
        if !pnl_fraction.is_nan() {
            self.daily_pnl += pnl_fraction;
        }
    }

    /// Day-boundary reset: runs exactly once per new calendar day, before any
    /// other rule evaluates for that day's first bar.
    pub fn reset_for_day(&mut self, day: NaiveDate) {
        self.current_day = Some(day);
        self.daily_pnl = 0.0;
        self.trading_enabled = true;
        self.position_fraction = 0.0;
        self.mode = Mode::Neutral;
    }
}

impl Default for StrategyState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_clamps_to_unit_interval() {
        let mut state = StrategyState::new();
        state.set_position_fraction(1.7);
        assert_eq!(state.position_fraction(), 1.0);
        state.set_position_fraction(-0.2);
        assert_eq!(state.position_fraction(), 0.0);
        state.set_position_fraction(f64::NAN);
        assert_eq!(state.position_fraction(), 0.0);
    }

    #[test]
    fn day_reset_clears_everything() {
        let mut state = StrategyState::new();
        state.mode = Mode::Long;
        state.set_position_fraction(0.7);
        state.trading_enabled = false;
        state.daily_pnl = -0.03;

        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        state.reset_for_day(day);

        assert_eq!(state.mode, Mode::Neutral);
        assert_eq!(state.position_fraction(), 0.0);
        assert!(state.trading_enabled);
        assert_eq!(state.daily_pnl, 0.0);
        assert_eq!(state.current_day, Some(day));
    }

    #[test]
    fn record_realized_ignores_nan() {
        let mut state = StrategyState::new();
        state.record_realized(-0.01);
        state.record_realized(f64::NAN);
        state.record_realized(-0.005);
        assert!((state.daily_pnl + 0.015).abs() < 1e-12);
    }
}
