//! CSV bar source.
//!
//! Expected header layout: a `timestamp` column, a `vix` column, one
//! `<SYM>_ret` column per strategy symbol, and optional
//! `<SYM>_open/_high/_low/_close` columns for the tradable pair. Missing
//! VIX cells forward-fill from the last observed value; missing return
//! cells become NaN and let the engine skip the bar. Persistence streak
//! columns (`long_persist`/`short_persist`) are honored when present and
//! reconstructed from pair-return sign streaks when absent.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::StringRecord;
use thiserror::Error;

use leverlab_core::{MarketBar, Quote, StrategyConfig};

use crate::config::DataConfig;

/// Timestamp formats accepted in the `timestamp` column.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(String),
    #[error("row {row}: unparseable timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },
    #[error("row {row}: bars out of order ({prev} then {got})")]
    OutOfOrder {
        row: usize,
        prev: NaiveDateTime,
        got: NaiveDateTime,
    },
}

/// Column indices resolved once from the header row.
struct ColumnMap {
    timestamp: usize,
    vix: Option<usize>,
    returns: Vec<(String, usize)>,
    quotes: Vec<(String, [usize; 4])>,
    long_persist: Option<usize>,
    short_persist: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord, strategy: &StrategyConfig) -> Result<Self, ReplayError> {
        let index: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();

        let require = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| ReplayError::MissingColumn(name.to_string()))
        };

        let mut returns = Vec::new();
        for symbol in strategy.pair.iter().chain([&strategy.secondary]) {
            returns.push((symbol.clone(), require(&format!("{symbol}_ret"))?));
        }

        // OHLC columns only need to exist for the tradable pair, and only
        // as a complete set per symbol.
        let mut quotes = Vec::new();
        for symbol in &strategy.pair {
            let cols = ["open", "high", "low", "close"]
                .map(|field| index.get(format!("{symbol}_{field}").as_str()).copied());
            if let [Some(o), Some(h), Some(l), Some(c)] = cols {
                quotes.push((symbol.clone(), [o, h, l, c]));
            }
        }

        Ok(Self {
            timestamp: require("timestamp")?,
            vix: index.get("vix").copied(),
            returns,
            quotes,
            long_persist: index.get("long_persist").copied(),
            short_persist: index.get("short_persist").copied(),
        })
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value.trim(), fmt).ok())
}

/// Missing or malformed numeric cells become NaN rather than errors; the
/// engine treats NaN inputs as a hold and the ledger logs a skip.
fn parse_cell(record: &StringRecord, idx: usize) -> f64 {
    record
        .get(idx)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Reads a bar stream from a CSV file, enforcing timestamp monotonicity.
pub fn load_bars(
    path: &Path,
    strategy: &StrategyConfig,
    data: &DataConfig,
) -> Result<Vec<MarketBar>, ReplayError> {
    let file = std::fs::File::open(path).map_err(|source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let columns = ColumnMap::resolve(reader.headers()?, strategy)?;

    let mut bars: Vec<MarketBar> = Vec::new();
    let mut last_vix = f64::NAN;
    let mut long_streak: u32 = 0;
    let mut short_streak: u32 = 0;

    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        let row = row_index + 2; // 1-based, after the header

        let raw_ts = record.get(columns.timestamp).unwrap_or("");
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| ReplayError::BadTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;
        if let Some(prev) = bars.last().map(|b| b.timestamp) {
            if timestamp <= prev {
                return Err(ReplayError::OutOfOrder {
                    row,
                    prev,
                    got: timestamp,
                });
            }
        }

        // VIX forward-fills across gaps; bars before the first print carry
        // NaN and are skipped downstream.
        if let Some(idx) = columns.vix {
            let vix = parse_cell(&record, idx);
            if vix.is_finite() {
                last_vix = vix;
            }
        }

        let mut bar = MarketBar::new(timestamp, last_vix);
        for (symbol, idx) in &columns.returns {
            bar = bar.with_return(symbol, parse_cell(&record, *idx));
        }
        for (symbol, [o, h, l, c]) in &columns.quotes {
            bar = bar.with_quote(
                symbol,
                Quote {
                    open: parse_cell(&record, *o),
                    high: parse_cell(&record, *h),
                    low: parse_cell(&record, *l),
                    close: parse_cell(&record, *c),
                },
            );
        }

        let ret_a = bar.ret(&strategy.pair[0]);
        let ret_b = bar.ret(&strategy.pair[1]);
        if bars.last().map(|b| b.day()) != Some(bar.day()) {
            long_streak = 0;
            short_streak = 0;
        }
        long_streak = if ret_a > 0.0 && ret_b > 0.0 { long_streak + 1 } else { 0 };
        short_streak = if ret_a < 0.0 && ret_b < 0.0 { short_streak + 1 } else { 0 };

        let (long_persist, short_persist) = match (columns.long_persist, columns.short_persist) {
            (Some(l), Some(s)) => {
                let lp = parse_cell(&record, l);
                let sp = parse_cell(&record, s);
                (
                    if lp.is_finite() { lp.max(0.0) as u32 } else { 0 },
                    if sp.is_finite() { sp.max(0.0) as u32 } else { 0 },
                )
            }
            _ => (
                long_streak * data.bar_minutes,
                short_streak * data.bar_minutes,
            ),
        };
        bars.push(bar.with_persistence(long_persist, short_persist));
    }

    Ok(bars)
}
