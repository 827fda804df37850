//! Domain types — bars, modes, strategy state, positions, ledger events.

pub mod bar;
pub mod event;
pub mod mode;
pub mod position;
pub mod state;

pub use bar::{MarketBar, Quote};
pub use event::{ExitReason, LedgerEvent, SkipReason};
pub use mode::Mode;
pub use position::Position;
pub use state::StrategyState;
