//! Position — the single open exposure tracked by the ledger.

use super::mode::Mode;
use serde::{Deserialize, Serialize};

/// At most one position is open at a time. Created on entry, destroyed on
/// exit/resize/stop/end-of-day, realizing P&L into ledger equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub entry_price: f64,
    /// Units held. Fractional — notional / entry price, never rounded.
    pub quantity: f64,
    /// Dollar notional at entry (equity at entry × leverage).
    pub notional: f64,
    pub leverage_at_entry: f64,
    pub mode: Mode,
}

impl Position {
    /// Unrealized P&L marked at `price`, signed by direction.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.mode {
            Mode::Long => self.quantity * (price - self.entry_price),
            Mode::Short => self.quantity * (self.entry_price - price),
            Mode::Neutral => 0.0,
        }
    }

    /// Current dollar notional marked at `price`.
    pub fn marked_notional(&self, price: f64) -> f64 {
        self.quantity * price
    }
}
