//! Parameter sweeps — grid search over risk settings.
//!
//! Each grid cell is an independent single-threaded backtest; cells run in
//! parallel via rayon and results are keyed by the cell's `run_id`.

use rayon::prelude::*;

use crate::config::{RunConfig, RunId};
use crate::driver::{run_backtest, BacktestResult, RunError};
use leverlab_core::MarketBar;

/// Grid specification. Empty axes fall back to the base config's value, so
/// a grid with only `stop_pcts` set sweeps one dimension.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    /// Equity-stop levels to test.
    pub stop_pcts: Vec<f64>,
    /// Multipliers applied to every entry-ladder threshold.
    pub entry_scales: Vec<f64>,
    /// Ceilings applied to every leverage-table base (both sides).
    pub leverage_caps: Vec<f64>,
}

impl Default for ParamGrid {
    /// The grid used by the nightly risk sweep.
    fn default() -> Self {
        Self {
            stop_pcts: vec![0.015, 0.018, 0.022],
            entry_scales: vec![0.8, 1.0, 1.25],
            leverage_caps: vec![3.0, 5.0],
        }
    }
}

impl ParamGrid {
    /// An empty axis means "keep the base value" and contributes one cell.
    pub fn size(&self) -> usize {
        self.stop_pcts.len().max(1)
            * self.entry_scales.len().max(1)
            * self.leverage_caps.len().max(1)
    }

    /// Generates every cell config from a base. Cells that fail core
    /// validation (e.g. a scale collapsing the ladder ordering) are
    /// silently dropped.
    pub fn generate_configs(&self, base: &RunConfig) -> Vec<RunConfig> {
        let stops: Vec<Option<f64>> = option_axis(&self.stop_pcts);
        let scales: Vec<Option<f64>> = option_axis(&self.entry_scales);
        let caps: Vec<Option<f64>> = option_axis(&self.leverage_caps);

        let mut configs = Vec::new();
        for stop in &stops {
            for scale in &scales {
                for cap in &caps {
                    let mut config = base.clone();
                    if let Some(stop) = stop {
                        config.ledger.stop_pct = *stop;
                    }
                    if let Some(scale) = scale {
                        for rung in &mut config.strategy.entry_ladder.rungs {
                            rung.threshold *= scale;
                        }
                    }
                    if let Some(cap) = cap {
                        for table in [
                            &mut config.strategy.long_leverage,
                            &mut config.strategy.short_leverage,
                        ] {
                            for band in &mut table.bands {
                                band.base = band.base.min(*cap);
                            }
                            table.default_base = table.default_base.min(*cap);
                        }
                    }
                    if config.validate().is_ok() {
                        configs.push(config);
                    }
                }
            }
        }
        configs
    }
}

fn option_axis(values: &[f64]) -> Vec<Option<f64>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().copied().map(Some).collect()
    }
}

/// One completed sweep cell.
#[derive(Debug)]
pub struct SweepCell {
    pub run_id: RunId,
    pub config: RunConfig,
    pub result: Result<BacktestResult, RunError>,
}

/// Runs every grid cell over the same bar stream in parallel.
pub fn run_sweep(bars: &[MarketBar], base: &RunConfig, grid: &ParamGrid) -> Vec<SweepCell> {
    grid.generate_configs(base)
        .into_par_iter()
        .map(|config| SweepCell {
            run_id: config.run_id(),
            result: run_backtest(bars, &config),
            config,
        })
        .collect()
}
