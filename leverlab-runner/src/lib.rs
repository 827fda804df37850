//! LeverLab Runner — backtest orchestration over `leverlab-core`.
//!
//! This crate provides:
//! - TOML run configuration with content-addressed run IDs
//! - CSV bar replay with persistence-streak reconstruction
//! - Deterministic synthetic session generation
//! - The per-bar driver loop (engine step → ledger apply, EOD flattening,
//!   realized-P&L feedback)
//! - Performance metrics and CSV artifacts
//! - Parallel parameter sweeps

pub mod config;
pub mod driver;
pub mod metrics;
pub mod replay;
pub mod report;
pub mod sweep;
pub mod synthetic;

pub use config::{ConfigError, DataConfig, RunConfig, RunId};
pub use driver::{run_backtest, BacktestResult, DailyPoint, EquityPoint, RunError};
pub use metrics::PerformanceMetrics;
pub use replay::{load_bars, ReplayError};
pub use report::{write_daily_equity, write_equity_curve, write_event_tape, ReportError};
pub use sweep::{run_sweep, ParamGrid, SweepCell};
pub use synthetic::{generate_bars, write_bars_csv, SyntheticConfig, BARS_PER_SESSION};
