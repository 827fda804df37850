//! StrategyEngine — bar-sequential mode and exposure decision.
//!
//! `step` is a pure function of (state, bar); it performs no I/O and holds no
//! hidden state. Rules evaluate in a fixed order per bar:
//!
//! 1. Out-of-order bar rejection
//! 2. Day-boundary reset
//! 3. NaN no-op guard (forward-fill contract)
//! 4. Daily kill switch (latched until the next day boundary)
//! 5. Mode detection from pair-return agreement
//! 6. Reference return and asset selection
//! 7. Progressive-entry ratchet
//! 8. Anti-churn hysteresis
//! 9. Soft invalidation (halve on zero-cross)
//! 10. Hard exit (flatten past the adverse threshold)
//! 11. Leverage derivation from the VIX table

use crate::config::{AntiChurn, ConfigError, EntryLadder, StrategyConfig};
use crate::domain::{MarketBar, Mode, StrategyState};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a single `step` call. Both variants are fatal to the run:
/// continuing past them would corrupt the Markovian state.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("bar at {got} is not after previous bar at {last} — bars must arrive in strictly increasing timestamp order")]
    OutOfOrderBar {
        last: NaiveDateTime,
        got: NaiveDateTime,
    },
}

/// Per-bar output of the engine: the target exposure the ledger executes.
///
/// `leverage` is derived fresh every bar from VIX and the fraction; it is
/// never persisted in `StrategyState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub mode: Mode,
    pub position_fraction: f64,
    pub leverage: f64,
    /// Selected leg of the pair, when the mode is directional.
    pub target_symbol: Option<String>,
    pub reference_return: f64,
    pub trading_enabled: bool,
    /// Set when a NaN field made this bar a no-op; the ledger holds.
    pub no_op: bool,
}

/// The mode/exposure state machine. Construction validates the configuration;
/// a running engine can never observe a malformed threshold.
#[derive(Debug, Clone)]
pub struct StrategyEngine {
    config: StrategyConfig,
}

impl StrategyEngine {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Advance the state machine by one bar.
    pub fn step(
        &self,
        state: &mut StrategyState,
        bar: &MarketBar,
    ) -> Result<Decision, StepError> {
        // 1. Bars are Markovian on the state — reordering is undefined
        //    behavior, so reject it at the boundary instead.
        if let Some(last) = state.last_timestamp {
            if bar.timestamp <= last {
                return Err(StepError::OutOfOrderBar {
                    last,
                    got: bar.timestamp,
                });
            }
        }
        state.last_timestamp = Some(bar.timestamp);

        // 2. Day boundary, before any other rule fires for the day's first bar.
        let day = bar.day();
        if state.current_day != Some(day) {
            state.reset_for_day(day);
        }

        let cfg = &self.config;
        let ret_a = bar.ret(&cfg.pair[0]);
        let ret_b = bar.ret(&cfg.pair[1]);
        let secondary_ret = bar.ret(&cfg.secondary);

        // 3. NaN anywhere in the consumed fields makes the bar a no-op:
        //    carry mode and fraction forward unchanged (forward-fill contract).
        if ret_a.is_nan() || ret_b.is_nan() || secondary_ret.is_nan() || bar.vix.is_nan() {
            return Ok(Decision {
                mode: state.mode,
                position_fraction: state.position_fraction(),
                leverage: 0.0,
                target_symbol: None,
                reference_return: 0.0,
                trading_enabled: state.trading_enabled,
                no_op: true,
            });
        }

        // 4. Kill switch: trips once, stays tripped until the next day reset.
        if state.daily_pnl <= cfg.daily_kill {
            state.trading_enabled = false;
        }
        if !state.trading_enabled {
            state.set_position_fraction(0.0);
            return Ok(self.decision(state, None, 0.0, bar.vix));
        }

        // 5. Mode detection: agreement of the correlated pair.
        state.mode = detect_mode(ret_a, ret_b);
        if state.mode == Mode::Neutral {
            state.set_position_fraction(0.0);
        }

        // 6. Reference return picks the most favorable leg; exact ties go to
        //    the first listed symbol (deterministic, documented choice).
        let (asset_ret, target_symbol) = match state.mode {
            Mode::Long => {
                if ret_a >= ret_b {
                    (ret_a, Some(cfg.pair[0].clone()))
                } else {
                    (ret_b, Some(cfg.pair[1].clone()))
                }
            }
            Mode::Short => {
                if ret_a <= ret_b {
                    (ret_a, Some(cfg.pair[0].clone()))
                } else {
                    (ret_b, Some(cfg.pair[1].clone()))
                }
            }
            Mode::Neutral => (0.0, None),
        };

        // 7–10. Exposure rules, in order.
        let mut fraction = state.position_fraction();
        fraction = apply_entry_ladder(&cfg.entry_ladder, state.mode, asset_ret, fraction);
        fraction = apply_anti_churn(
            &cfg.anti_churn,
            state.mode,
            secondary_ret,
            bar.long_persist,
            bar.short_persist,
            fraction,
        );
        fraction = apply_invalidation(state.mode, asset_ret, cfg.invalid_zero, fraction);
        fraction = apply_hard_exit(state.mode, asset_ret, cfg.hard_exit, fraction);
        state.set_position_fraction(fraction);

        Ok(self.decision(state, target_symbol, asset_ret, bar.vix))
    }

    /// 11. Derive leverage and package the decision.
    fn decision(
        &self,
        state: &StrategyState,
        target_symbol: Option<String>,
        reference_return: f64,
        vix: f64,
    ) -> Decision {
        let base = match state.mode {
            Mode::Long => self.config.long_leverage.base_for(vix),
            Mode::Short => self.config.short_leverage.base_for(vix),
            Mode::Neutral => 0.0,
        };
        Decision {
            mode: state.mode,
            position_fraction: state.position_fraction(),
            leverage: base * state.position_fraction(),
            target_symbol,
            reference_return,
            trading_enabled: state.trading_enabled,
            no_op: false,
        }
    }
}

/// Both legs positive → Long, both negative → Short, otherwise Neutral.
/// A zero leg counts as disagreement.
fn detect_mode(ret_a: f64, ret_b: f64) -> Mode {
    if ret_a > 0.0 && ret_b > 0.0 {
        Mode::Long
    } else if ret_a < 0.0 && ret_b < 0.0 {
        Mode::Short
    } else {
        Mode::Neutral
    }
}

/// Monotonic ratchet: every rung crossed in the trade's favor raises the
/// fraction to at least its floor. Rungs apply ascending, each as a max() —
/// this step alone never lowers the fraction.
fn apply_entry_ladder(ladder: &EntryLadder, mode: Mode, asset_ret: f64, mut fraction: f64) -> f64 {
    for rung in &ladder.rungs {
        let crossed = match mode {
            Mode::Long => asset_ret >= rung.threshold,
            Mode::Short => asset_ret <= -rung.threshold,
            Mode::Neutral => false,
        };
        if crossed {
            fraction = fraction.max(rung.floor);
        }
    }
    fraction
}

/// Hysteresis against churn: a moderate, persistent move in the secondary
/// index holds the fraction at a floor instead of letting a minor pullback
/// flatten it. Mirrored for the short side when configured.
fn apply_anti_churn(
    churn: &AntiChurn,
    mode: Mode,
    secondary_ret: f64,
    long_persist: u32,
    short_persist: u32,
    fraction: f64,
) -> f64 {
    match mode {
        Mode::Long => {
            if secondary_ret >= churn.band_lo
                && secondary_ret <= churn.band_hi
                && long_persist >= churn.min_persist
            {
                return fraction.max(churn.floor);
            }
        }
        Mode::Short if churn.short_side => {
            if secondary_ret <= -churn.band_lo
                && secondary_ret >= -churn.band_hi
                && short_persist >= churn.min_persist
            {
                return fraction.max(churn.floor);
            }
        }
        _ => {}
    }
    fraction
}

/// Soft invalidation: the reference return crossing back through zero against
/// the position halves the fraction — a graceful de-risk, not an exit.
fn apply_invalidation(mode: Mode, asset_ret: f64, invalid_zero: f64, fraction: f64) -> f64 {
    let crossed = match mode {
        Mode::Long => asset_ret <= invalid_zero,
        Mode::Short => asset_ret >= invalid_zero,
        Mode::Neutral => false,
    };
    if crossed {
        fraction * 0.5
    } else {
        fraction
    }
}

/// Hard exit: an adverse move beyond the threshold flattens unconditionally,
/// overriding the ladder, anti-churn, and invalidation outcomes.
fn apply_hard_exit(mode: Mode, asset_ret: f64, hard_exit: f64, fraction: f64) -> f64 {
    let breached = match mode {
        Mode::Long => asset_ret <= -hard_exit,
        Mode::Short => asset_ret >= hard_exit,
        Mode::Neutral => false,
    };
    if breached {
        0.0
    } else {
        fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn bar(day: u32, h: u32, m: u32, smh: f64, soxx: f64, qqq: f64, vix: f64) -> MarketBar {
        MarketBar::new(ts(day, h, m), vix)
            .with_return("SMH", smh)
            .with_return("SOXX", soxx)
            .with_return("QQQ", qqq)
    }

    fn engine() -> StrategyEngine {
        StrategyEngine::new(StrategyConfig::default()).unwrap()
    }

    #[test]
    fn mode_detection_requires_agreement() {
        assert_eq!(detect_mode(0.001, 0.002), Mode::Long);
        assert_eq!(detect_mode(-0.001, -0.002), Mode::Short);
        assert_eq!(detect_mode(0.001, -0.002), Mode::Neutral);
        assert_eq!(detect_mode(0.0, 0.002), Mode::Neutral);
        assert_eq!(detect_mode(-0.001, 0.0), Mode::Neutral);
    }

    #[test]
    fn ladder_is_monotonic_ratchet() {
        let ladder = EntryLadder::default();
        // Below all rungs: unchanged.
        assert_eq!(apply_entry_ladder(&ladder, Mode::Long, 0.0005, 0.0), 0.0);
        // Between rung 1 and 2.
        assert_eq!(apply_entry_ladder(&ladder, Mode::Long, 0.0015, 0.0), 0.5);
        // A prior higher fraction is never lowered by the ladder.
        assert_eq!(apply_entry_ladder(&ladder, Mode::Long, 0.0015, 0.7), 0.7);
        // All rungs crossed.
        assert_eq!(apply_entry_ladder(&ladder, Mode::Long, 0.0035, 0.0), 1.0);
        // Short side mirrors with negated thresholds.
        assert_eq!(apply_entry_ladder(&ladder, Mode::Short, -0.0022, 0.0), 0.7);
    }

    #[test]
    fn anti_churn_holds_floor_during_persistent_move() {
        let churn = AntiChurn::default();
        // In band, persisted long enough: floor applies.
        assert_eq!(
            apply_anti_churn(&churn, Mode::Long, 0.005, 35, 0, 0.2),
            0.5
        );
        // In band but not persisted: no effect.
        assert_eq!(
            apply_anti_churn(&churn, Mode::Long, 0.005, 10, 0, 0.2),
            0.2
        );
        // Out of band: no effect.
        assert_eq!(
            apply_anti_churn(&churn, Mode::Long, 0.009, 35, 0, 0.2),
            0.2
        );
        // Short mirror.
        assert_eq!(
            apply_anti_churn(&churn, Mode::Short, -0.005, 0, 35, 0.2),
            0.5
        );
    }

    #[test]
    fn anti_churn_short_side_can_be_disabled() {
        let churn = AntiChurn {
            short_side: false,
            ..AntiChurn::default()
        };
        assert_eq!(
            apply_anti_churn(&churn, Mode::Short, -0.005, 0, 35, 0.2),
            0.2
        );
    }

    /// Scenario: prior fraction 0.7, reference return crosses back through
    /// zero against a long — fraction halves, mode untouched by this rule.
    #[test]
    fn invalidation_halves_instead_of_flattening() {
        assert_eq!(apply_invalidation(Mode::Long, -0.0001, 0.0, 0.7), 0.35);
        assert_eq!(apply_invalidation(Mode::Long, 0.0001, 0.0, 0.7), 0.7);
        assert_eq!(apply_invalidation(Mode::Short, 0.0001, 0.0, 0.7), 0.35);
        // Exactly at the zero level counts as crossed (inclusive).
        assert_eq!(apply_invalidation(Mode::Long, 0.0, 0.0, 0.8), 0.4);
    }

    /// Scenario: adverse move beyond the hard threshold zeroes the fraction
    /// regardless of prior value.
    #[test]
    fn hard_exit_flattens_unconditionally() {
        assert_eq!(apply_hard_exit(Mode::Long, -0.003, 0.002, 1.0), 0.0);
        assert_eq!(apply_hard_exit(Mode::Long, -0.001, 0.002, 1.0), 1.0);
        assert_eq!(apply_hard_exit(Mode::Short, 0.003, 0.002, 0.5), 0.0);
    }

    /// Scenario: LONG, reference return between the first two rungs, VIX 11
    /// → fraction 0.5, leverage 4.0 × 0.5 = 2.0.
    #[test]
    fn full_step_first_rung_low_vix() {
        let engine = engine();
        let mut state = StrategyState::new();
        let decision = engine
            .step(&mut state, &bar(4, 9, 35, 0.0015, 0.0010, 0.001, 11.0))
            .unwrap();

        assert_eq!(decision.mode, Mode::Long);
        assert_eq!(decision.position_fraction, 0.5);
        assert_eq!(decision.leverage, 2.0);
        assert_eq!(decision.target_symbol.as_deref(), Some("SMH"));
        assert_eq!(decision.reference_return, 0.0015);
    }

    #[test]
    fn tie_break_first_listed_symbol_wins() {
        let engine = engine();
        let mut state = StrategyState::new();
        let decision = engine
            .step(&mut state, &bar(4, 9, 35, 0.0015, 0.0015, 0.001, 14.0))
            .unwrap();
        assert_eq!(decision.target_symbol.as_deref(), Some("SMH"));

        let mut state = StrategyState::new();
        let decision = engine
            .step(&mut state, &bar(4, 9, 40, -0.0015, -0.0015, -0.001, 14.0))
            .unwrap();
        assert_eq!(decision.mode, Mode::Short);
        assert_eq!(decision.target_symbol.as_deref(), Some("SMH"));
    }

    #[test]
    fn neutral_mode_forces_zero_fraction() {
        let engine = engine();
        let mut state = StrategyState::new();
        // Establish a long with exposure.
        engine
            .step(&mut state, &bar(4, 9, 35, 0.0025, 0.0022, 0.001, 14.0))
            .unwrap();
        assert!(state.position_fraction() > 0.0);

        // Mixed signs → neutral → fraction forced to zero.
        let decision = engine
            .step(&mut state, &bar(4, 9, 40, 0.001, -0.001, 0.0, 14.0))
            .unwrap();
        assert_eq!(decision.mode, Mode::Neutral);
        assert_eq!(decision.position_fraction, 0.0);
        assert_eq!(decision.leverage, 0.0);
    }

    /// Scenario: daily P&L at the kill level disables trading; a later
    /// strongly bullish bar the same day still yields zero exposure.
    #[test]
    fn kill_switch_latches_for_the_day() {
        let engine = engine();
        let mut state = StrategyState::new();
        engine
            .step(&mut state, &bar(4, 9, 35, 0.0015, 0.0010, 0.001, 14.0))
            .unwrap();

        state.record_realized(-0.025);
        let decision = engine
            .step(&mut state, &bar(4, 9, 40, 0.0015, 0.0010, 0.001, 14.0))
            .unwrap();
        assert!(!decision.trading_enabled);
        assert_eq!(decision.position_fraction, 0.0);

        // Strong bullish signal, same day: still flat.
        let decision = engine
            .step(&mut state, &bar(4, 10, 0, 0.0040, 0.0035, 0.005, 11.0))
            .unwrap();
        assert!(!decision.trading_enabled);
        assert_eq!(decision.position_fraction, 0.0);
        assert_eq!(decision.leverage, 0.0);

        // Next day: reset re-arms trading.
        let decision = engine
            .step(&mut state, &bar(5, 9, 30, 0.0015, 0.0010, 0.001, 14.0))
            .unwrap();
        assert!(decision.trading_enabled);
        assert_eq!(decision.position_fraction, 0.5);
    }

    #[test]
    fn day_boundary_resets_before_rules() {
        let engine = engine();
        let mut state = StrategyState::new();
        engine
            .step(&mut state, &bar(4, 15, 55, 0.0035, 0.0030, 0.004, 11.0))
            .unwrap();
        assert_eq!(state.position_fraction(), 1.0);
        state.record_realized(-0.03);

        // First bar of the next day: pnl and kill state cleared before the
        // kill check, so the new day trades normally.
        let decision = engine
            .step(&mut state, &bar(5, 9, 30, 0.0015, 0.0012, 0.001, 14.0))
            .unwrap();
        assert_eq!(state.daily_pnl, 0.0);
        assert!(decision.trading_enabled);
        assert_eq!(decision.position_fraction, 0.5);
    }

    #[test]
    fn nan_bar_is_a_no_op() {
        let engine = engine();
        let mut state = StrategyState::new();
        engine
            .step(&mut state, &bar(4, 9, 35, 0.0025, 0.0022, 0.001, 14.0))
            .unwrap();
        let prior_mode = state.mode;
        let prior_fraction = state.position_fraction();

        let decision = engine
            .step(&mut state, &bar(4, 9, 40, f64::NAN, 0.0022, 0.001, 14.0))
            .unwrap();
        assert!(decision.no_op);
        assert_eq!(state.mode, prior_mode);
        assert_eq!(state.position_fraction(), prior_fraction);

        // NaN VIX takes the same path.
        let decision = engine
            .step(&mut state, &bar(4, 9, 45, 0.0025, 0.0022, 0.001, f64::NAN))
            .unwrap();
        assert!(decision.no_op);
    }

    #[test]
    fn out_of_order_bar_rejected() {
        let engine = engine();
        let mut state = StrategyState::new();
        engine
            .step(&mut state, &bar(4, 9, 35, 0.001, 0.001, 0.0, 14.0))
            .unwrap();

        // Same timestamp: rejected.
        let err = engine
            .step(&mut state, &bar(4, 9, 35, 0.001, 0.001, 0.0, 14.0))
            .unwrap_err();
        assert!(matches!(err, StepError::OutOfOrderBar { .. }));

        // Earlier timestamp: rejected, state untouched.
        let fraction_before = state.position_fraction();
        let err = engine
            .step(&mut state, &bar(4, 9, 30, 0.001, 0.001, 0.0, 14.0))
            .unwrap_err();
        assert!(matches!(err, StepError::OutOfOrderBar { .. }));
        assert_eq!(state.position_fraction(), fraction_before);
    }

    #[test]
    fn identical_states_and_bar_give_identical_results() {
        let engine = engine();
        let mut a = StrategyState::new();
        let mut b = StrategyState::new();
        let input = bar(4, 9, 35, 0.0021, 0.0018, 0.004, 13.0);

        let da = engine.step(&mut a, &input).unwrap();
        let db = engine.step(&mut b, &input).unwrap();
        assert_eq!(da, db);
        assert_eq!(a, b);
    }

    #[test]
    fn short_mode_uses_short_table() {
        let engine = engine();
        let mut state = StrategyState::new();
        let decision = engine
            .step(&mut state, &bar(4, 9, 35, -0.0035, -0.0032, -0.002, 27.0))
            .unwrap();
        assert_eq!(decision.mode, Mode::Short);
        assert_eq!(decision.position_fraction, 1.0);
        // VIX 27 → base 5.0 on the short table.
        assert_eq!(decision.leverage, 5.0);
    }
}
