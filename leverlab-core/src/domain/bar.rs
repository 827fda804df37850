//! MarketBar — one timestamped observation of the traded universe.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OHLC quote for a single symbol on a single bar.
///
/// `low`/`high` are the intrabar extremes the ledger uses as worst-case
/// stand-ins for the equity-stop trigger price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Quote {
    /// All four fields present and positive.
    pub fn is_sane(&self) -> bool {
        !(self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan())
            && self.high >= self.low
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// One time-ordered observation consumed read-only by the engine and ledger.
///
/// `returns` maps symbol to its signed intraday return measured from the
/// day's open. Persistence counters carry the number of consecutive minutes
/// the pair has spent agreeing in each direction; the data source computes
/// them (forward-filled, never interpolated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub timestamp: NaiveDateTime,
    pub returns: HashMap<String, f64>,
    pub quotes: HashMap<String, Quote>,
    pub vix: f64,
    pub long_persist: u32,
    pub short_persist: u32,
}

impl MarketBar {
    pub fn new(timestamp: NaiveDateTime, vix: f64) -> Self {
        Self {
            timestamp,
            returns: HashMap::new(),
            quotes: HashMap::new(),
            vix,
            long_persist: 0,
            short_persist: 0,
        }
    }

    pub fn with_return(mut self, symbol: &str, ret: f64) -> Self {
        self.returns.insert(symbol.to_string(), ret);
        self
    }

    pub fn with_quote(mut self, symbol: &str, quote: Quote) -> Self {
        self.quotes.insert(symbol.to_string(), quote);
        self
    }

    pub fn with_persistence(mut self, long_persist: u32, short_persist: u32) -> Self {
        self.long_persist = long_persist;
        self.short_persist = short_persist;
        self
    }

    /// Calendar day of this bar (drives daily resets).
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Signed return for a symbol. Missing symbols surface as NaN so the
    /// engine's no-op guard treats them like any other bad field.
    pub fn ret(&self, symbol: &str) -> f64 {
        self.returns.get(symbol).copied().unwrap_or(f64::NAN)
    }

    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(symbol)
    }
}
