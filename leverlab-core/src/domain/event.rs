//! Ledger events — the fill/exit tape consumed by the reporting sink.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Why an open position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Direction flipped (LONG ↔ SHORT ↔ NEUTRAL).
    ModeFlip,
    /// The selected asset switched within the pair.
    AssetSwitch,
    /// The engine's authorized fraction returned to zero.
    FractionZero,
    /// Daily kill switch disabled trading for the rest of the day.
    KillSwitch,
    /// Forced flat at the day's last bar — nothing is held overnight.
    EndOfDay,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::ModeFlip => "MODE_FLIP",
            ExitReason::AssetSwitch => "ASSET_SWITCH",
            ExitReason::FractionZero => "FRACTION_ZERO",
            ExitReason::KillSwitch => "KILL_SWITCH",
            ExitReason::EndOfDay => "END_OF_DAY",
        };
        f.write_str(s)
    }
}

/// Why a bar produced no position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// NaN in a return or VIX field — the engine carried state forward.
    NanInput,
    /// Fill price missing for the target symbol.
    MissingPrice,
    /// Fill price zero, negative, or NaN. The ledger must not divide.
    BadPrice,
    /// Day-start equity is zero or NaN. The ledger must not divide.
    BadDayStartEquity,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::NanInput => "NAN_INPUT",
            SkipReason::MissingPrice => "MISSING_PRICE",
            SkipReason::BadPrice => "BAD_PRICE",
            SkipReason::BadDayStartEquity => "BAD_DAY_START_EQUITY",
        };
        f.write_str(s)
    }
}

/// One realization or warning event emitted by the ledger.
///
/// `cash_equity` changes only at events carrying realized P&L (`Exited`,
/// `Resized`, `Stopped`) — never from mark-to-market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEvent {
    Entered {
        timestamp: NaiveDateTime,
        symbol: String,
        price: f64,
        quantity: f64,
        notional: f64,
        leverage: f64,
    },
    Resized {
        timestamp: NaiveDateTime,
        symbol: String,
        price: f64,
        pnl: f64,
        notional_before: f64,
        notional_after: f64,
    },
    Exited {
        timestamp: NaiveDateTime,
        symbol: String,
        price: f64,
        pnl: f64,
        reason: ExitReason,
    },
    /// Equity stop fired; realized loss is capped at the configured maximum,
    /// not the (possibly deeper) intrabar mark.
    Stopped {
        timestamp: NaiveDateTime,
        symbol: String,
        trigger_price: f64,
        pnl: f64,
    },
    /// Warning-level data condition; no position change this bar.
    BarSkipped {
        timestamp: NaiveDateTime,
        reason: SkipReason,
    },
}

impl LedgerEvent {
    /// Realized P&L carried by this event, if any.
    pub fn realized_pnl(&self) -> Option<f64> {
        match self {
            LedgerEvent::Exited { pnl, .. }
            | LedgerEvent::Resized { pnl, .. }
            | LedgerEvent::Stopped { pnl, .. } => Some(*pnl),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            LedgerEvent::Entered { timestamp, .. }
            | LedgerEvent::Resized { timestamp, .. }
            | LedgerEvent::Exited { timestamp, .. }
            | LedgerEvent::Stopped { timestamp, .. }
            | LedgerEvent::BarSkipped { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, LedgerEvent::BarSkipped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn realized_pnl_only_on_realization_events() {
        let entered = LedgerEvent::Entered {
            timestamp: ts(),
            symbol: "SMH".into(),
            price: 200.0,
            quantity: 1500.0,
            notional: 300_000.0,
            leverage: 3.0,
        };
        assert_eq!(entered.realized_pnl(), None);

        let stopped = LedgerEvent::Stopped {
            timestamp: ts(),
            symbol: "SMH".into(),
            trigger_price: 195.0,
            pnl: -1800.0,
        };
        assert_eq!(stopped.realized_pnl(), Some(-1800.0));
    }

    #[test]
    fn skip_is_warning() {
        let skip = LedgerEvent::BarSkipped {
            timestamp: ts(),
            reason: SkipReason::NanInput,
        };
        assert!(skip.is_warning());
    }
}
