//! LeverLab Core — strategy state machine, leverage tables, equity ledger.
//!
//! This crate contains the decision and accounting core of the system:
//! - Domain types (market bars, strategy state, positions, ledger events)
//! - Validated configuration (entry ladder, VIX leverage tables, stop settings)
//! - `StrategyEngine`: bar-sequential mode/exposure decision function
//! - `EquityLedger`: position lifecycle and realized/unrealized accounting
//!
//! The core is pure and synchronous. It performs no I/O, carries no timers or
//! async constructs, and signals every abnormal condition through typed errors
//! or ledger events. Data sources and execution sinks live in `leverlab-runner`.

pub mod config;
pub mod domain;
pub mod engine;
pub mod ledger;

pub use config::{
    AntiChurn, ConfigError, EntryLadder, FillConvention, LedgerConfig, LeverageTable,
    RebalancePolicy, StrategyConfig,
};
pub use domain::{ExitReason, LedgerEvent, MarketBar, Mode, Position, Quote, SkipReason, StrategyState};
pub use engine::{Decision, StepError, StrategyEngine};
pub use ledger::{EquityLedger, LedgerError, LedgerSnapshot};
