//! Validated configuration for the engine and ledger.
//!
//! Every tunable that the deployed variants hardcoded — entry thresholds,
//! VIX→leverage tables, stop percentages, rebalance gating, fill convention —
//! is an explicit field here. Malformed configuration (non-ascending
//! thresholds, inverted bands, non-positive leverage) is rejected at
//! construction, never mid-run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration rejected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("entry ladder thresholds must be strictly ascending and positive: {0:?}")]
    EntryLadderOrder(Vec<f64>),

    #[error("entry ladder floors must be ascending within (0, 1]: {0:?}")]
    EntryLadderFloors(Vec<f64>),

    #[error("leverage table VIX bounds must be strictly ascending: {0:?}")]
    LeverageBandOrder(Vec<f64>),

    #[error("leverage base must be positive and finite, got {0}")]
    BadLeverageBase(f64),

    #[error("anti-churn band must satisfy 0 < lo < hi, got [{lo}, {hi}]")]
    BadAntiChurnBand { lo: f64, hi: f64 },

    #[error("hard exit threshold must be positive, got {0}")]
    BadHardExit(f64),

    #[error("daily kill level must be negative, got {0}")]
    BadDailyKill(f64),

    #[error("correlated pair symbols must be distinct, got {0:?}")]
    DuplicatePairSymbol(String),

    #[error("stop percentage must be in (0, 1), got {0}")]
    BadStopPct(f64),

    #[error("stop buffer must be non-negative, got {0}")]
    BadStopBuffer(f64),

    #[error("rebalance notional threshold must be non-negative, got {0}")]
    BadRebalanceThreshold(f64),

    #[error("leverage tolerance must be non-negative, got {0}")]
    BadLeverageTolerance(f64),

    #[error("initial capital must be positive and finite, got {0}")]
    BadInitialCapital(f64),
}

/// One rung of the progressive-entry ratchet: crossing `threshold` in the
/// trade's favor authorizes at least `floor` of max exposure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryRung {
    pub threshold: f64,
    pub floor: f64,
}

/// Three ascending "at least" floors. Rungs are independent: every rung the
/// reference return has crossed is applied as a `max()`, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLadder {
    pub rungs: [EntryRung; 3],
}

impl EntryLadder {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds: Vec<f64> = self.rungs.iter().map(|r| r.threshold).collect();
        let ascending = thresholds.windows(2).all(|w| w[0] < w[1]);
        if !ascending || thresholds.iter().any(|t| !(*t > 0.0) || !t.is_finite()) {
            return Err(ConfigError::EntryLadderOrder(thresholds));
        }
        let floors: Vec<f64> = self.rungs.iter().map(|r| r.floor).collect();
        let floors_ok = floors.windows(2).all(|w| w[0] <= w[1])
            && floors.iter().all(|f| *f > 0.0 && *f <= 1.0);
        if !floors_ok {
            return Err(ConfigError::EntryLadderFloors(floors));
        }
        Ok(())
    }
}

impl Default for EntryLadder {
    /// Production thresholds: 0.12% / 0.20% / 0.30% authorize 50% / 70% / 100%.
    fn default() -> Self {
        Self {
            rungs: [
                EntryRung {
                    threshold: 0.0012,
                    floor: 0.5,
                },
                EntryRung {
                    threshold: 0.0020,
                    floor: 0.7,
                },
                EntryRung {
                    threshold: 0.0030,
                    floor: 1.0,
                },
            ],
        }
    }
}

/// One VIX band: applies while `vix < vix_below`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverageBand {
    pub vix_below: f64,
    pub base: f64,
}

/// Step function from VIX level to base leverage. Exact lookup, no
/// interpolation: the first band whose bound exceeds the VIX wins, otherwise
/// the catch-all base applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageTable {
    pub bands: Vec<LeverageBand>,
    pub default_base: f64,
}

impl LeverageTable {
    /// Canonical long-side table: highest leverage in calm markets.
    pub fn long_default() -> Self {
        Self {
            bands: vec![
                LeverageBand {
                    vix_below: 12.0,
                    base: 4.0,
                },
                LeverageBand {
                    vix_below: 15.0,
                    base: 3.0,
                },
            ],
            default_base: 2.0,
        }
    }

    /// Canonical short-side table: highest leverage in volatility spikes —
    /// shorts hedge against exactly the regime where long leverage backs off.
    pub fn short_default() -> Self {
        Self {
            bands: vec![
                LeverageBand {
                    vix_below: 20.0,
                    base: 2.0,
                },
                LeverageBand {
                    vix_below: 25.0,
                    base: 4.0,
                },
            ],
            default_base: 5.0,
        }
    }

    /// Base leverage for a VIX level.
    pub fn base_for(&self, vix: f64) -> f64 {
        for band in &self.bands {
            if vix < band.vix_below {
                return band.base;
            }
        }
        self.default_base
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds: Vec<f64> = self.bands.iter().map(|b| b.vix_below).collect();
        if !bounds.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::LeverageBandOrder(bounds));
        }
        for base in self
            .bands
            .iter()
            .map(|b| b.base)
            .chain(std::iter::once(self.default_base))
        {
            if !(base > 0.0) || !base.is_finite() {
                return Err(ConfigError::BadLeverageBase(base));
            }
        }
        Ok(())
    }
}

/// Anti-churn hysteresis: while the secondary index sits inside a narrow
/// favorable band and the move has persisted long enough, hold at least
/// `floor` rather than flattening on a minor pullback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntiChurn {
    /// Band bounds on the secondary-index return, positive (mirrored for shorts).
    pub band_lo: f64,
    pub band_hi: f64,
    /// Minimum consecutive minutes in-direction before the rule arms.
    pub min_persist: u32,
    pub floor: f64,
    /// Apply the mirrored band on the short side.
    pub short_side: bool,
}

impl AntiChurn {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.band_lo > 0.0 && self.band_lo < self.band_hi && self.band_hi.is_finite()) {
            return Err(ConfigError::BadAntiChurnBand {
                lo: self.band_lo,
                hi: self.band_hi,
            });
        }
        if !(self.floor > 0.0 && self.floor <= 1.0) {
            return Err(ConfigError::EntryLadderFloors(vec![self.floor]));
        }
        Ok(())
    }
}

impl Default for AntiChurn {
    fn default() -> Self {
        Self {
            band_lo: 0.003,
            band_hi: 0.007,
            min_persist: 30,
            floor: 0.5,
            short_side: true,
        }
    }
}

/// Full engine configuration. Immutable once constructed; the engine holds a
/// validated copy, so no rule can observe a malformed value mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Correlated pair whose return agreement defines the mode. On an exact
    /// return tie the first listed symbol wins, in both directions.
    pub pair: [String; 2],
    /// Secondary broad index driving the anti-churn rule.
    pub secondary: String,
    pub entry_ladder: EntryLadder,
    /// Zero-cross level for the soft invalidation (halving) rule.
    pub invalid_zero: f64,
    /// Adverse move beyond this level forces the fraction to zero.
    pub hard_exit: f64,
    /// Daily P&L fraction at or below which the kill switch trips.
    pub daily_kill: f64,
    pub long_leverage: LeverageTable,
    pub short_leverage: LeverageTable,
    pub anti_churn: AntiChurn,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pair[0] == self.pair[1] {
            return Err(ConfigError::DuplicatePairSymbol(self.pair[0].clone()));
        }
        self.entry_ladder.validate()?;
        if !(self.hard_exit > 0.0) || !self.hard_exit.is_finite() {
            return Err(ConfigError::BadHardExit(self.hard_exit));
        }
        if !(self.daily_kill < 0.0) || !self.daily_kill.is_finite() {
            return Err(ConfigError::BadDailyKill(self.daily_kill));
        }
        self.long_leverage.validate()?;
        self.short_leverage.validate()?;
        self.anti_churn.validate()?;
        Ok(())
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            pair: ["SMH".into(), "SOXX".into()],
            secondary: "QQQ".into(),
            entry_ladder: EntryLadder::default(),
            invalid_zero: 0.0,
            hard_exit: 0.002,
            daily_kill: -0.025,
            long_leverage: LeverageTable::long_default(),
            short_leverage: LeverageTable::short_default(),
            anti_churn: AntiChurn::default(),
        }
    }
}

/// Which bar price fills an entry. The intraday progressive-entry family
/// fills at the close; the daily crossover family at the open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillConvention {
    Close,
    Open,
}

/// Whether a leverage-target change rebalances every bar or only past a
/// dollar-notional threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalancePolicy {
    Continuous,
    Gated { min_notional: f64 },
}

/// Ledger (execution/accounting) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum realized daily loss fraction at the equity stop.
    pub stop_pct: f64,
    /// Extra trigger margin: the stop fires at `stop_pct + stop_buffer`
    /// drawdown but realizes only `stop_pct`.
    pub stop_buffer: f64,
    pub rebalance: RebalancePolicy,
    pub entry_fill: FillConvention,
    /// Leverage-target delta below which a resize is not considered at all.
    pub leverage_tolerance: f64,
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.stop_pct > 0.0 && self.stop_pct < 1.0) {
            return Err(ConfigError::BadStopPct(self.stop_pct));
        }
        if !(self.stop_buffer >= 0.0) || !self.stop_buffer.is_finite() {
            return Err(ConfigError::BadStopBuffer(self.stop_buffer));
        }
        if let RebalancePolicy::Gated { min_notional } = self.rebalance {
            if !(min_notional >= 0.0) || !min_notional.is_finite() {
                return Err(ConfigError::BadRebalanceThreshold(min_notional));
            }
        }
        if !(self.leverage_tolerance >= 0.0) || !self.leverage_tolerance.is_finite() {
            return Err(ConfigError::BadLeverageTolerance(self.leverage_tolerance));
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    /// Production settings: 1.8% stop + 0.1% buffer, $50 rebalance gate,
    /// close-of-bar fills.
    fn default() -> Self {
        Self {
            stop_pct: 0.018,
            stop_buffer: 0.001,
            rebalance: RebalancePolicy::Gated { min_notional: 50.0 },
            entry_fill: FillConvention::Close,
            leverage_tolerance: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_validate() {
        StrategyConfig::default().validate().unwrap();
        LedgerConfig::default().validate().unwrap();
    }

    #[test]
    fn ladder_rejects_non_ascending_thresholds() {
        let mut ladder = EntryLadder::default();
        ladder.rungs[1].threshold = 0.0012; // equal to rung 0
        assert!(matches!(
            ladder.validate(),
            Err(ConfigError::EntryLadderOrder(_))
        ));
    }

    #[test]
    fn ladder_rejects_floor_above_one() {
        let mut ladder = EntryLadder::default();
        ladder.rungs[2].floor = 1.5;
        assert!(matches!(
            ladder.validate(),
            Err(ConfigError::EntryLadderFloors(_))
        ));
    }

    #[test]
    fn long_table_matches_canonical_steps() {
        let table = LeverageTable::long_default();
        assert_eq!(table.base_for(11.0), 4.0);
        assert_eq!(table.base_for(12.0), 3.0); // boundary: band is strict <
        assert_eq!(table.base_for(14.9), 3.0);
        assert_eq!(table.base_for(15.0), 2.0);
        assert_eq!(table.base_for(40.0), 2.0);
    }

    #[test]
    fn short_table_matches_canonical_steps() {
        let table = LeverageTable::short_default();
        assert_eq!(table.base_for(18.0), 2.0);
        assert_eq!(table.base_for(22.0), 4.0);
        assert_eq!(table.base_for(25.0), 5.0);
        assert_eq!(table.base_for(35.0), 5.0);
    }

    #[test]
    fn leverage_table_rejects_unordered_bands() {
        let table = LeverageTable {
            bands: vec![
                LeverageBand {
                    vix_below: 15.0,
                    base: 3.0,
                },
                LeverageBand {
                    vix_below: 12.0,
                    base: 4.0,
                },
            ],
            default_base: 2.0,
        };
        assert!(matches!(
            table.validate(),
            Err(ConfigError::LeverageBandOrder(_))
        ));
    }

    #[test]
    fn leverage_table_rejects_non_positive_base() {
        let table = LeverageTable {
            bands: vec![],
            default_base: 0.0,
        };
        assert!(matches!(
            table.validate(),
            Err(ConfigError::BadLeverageBase(_))
        ));
    }

    #[test]
    fn strategy_config_rejects_duplicate_pair() {
        let config = StrategyConfig {
            pair: ["SMH".into(), "SMH".into()],
            ..StrategyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePairSymbol(_))
        ));
    }

    #[test]
    fn strategy_config_rejects_positive_kill_level() {
        let config = StrategyConfig {
            daily_kill: 0.025,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadDailyKill(_))
        ));
    }

    #[test]
    fn ledger_config_rejects_bad_stop() {
        let config = LedgerConfig {
            stop_pct: 0.0,
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::BadStopPct(_))));
    }

    #[test]
    fn anti_churn_rejects_inverted_band() {
        let churn = AntiChurn {
            band_lo: 0.007,
            band_hi: 0.003,
            ..AntiChurn::default()
        };
        assert!(matches!(
            churn.validate(),
            Err(ConfigError::BadAntiChurnBand { .. })
        ));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = StrategyConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: StrategyConfig = toml::from_str(&text).unwrap();
        assert_eq!(config, back);
    }
}
