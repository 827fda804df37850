//! CSV artifacts for a completed run: equity curve, daily equity, and the
//! flattened event tape.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use leverlab_core::LedgerEvent;

use crate::driver::BacktestResult;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> ReportError + '_ {
    move |source| ReportError::Csv {
        path: path.display().to_string(),
        source,
    }
}

/// One event tape row; enum variants flatten into a fixed column set so the
/// artifact opens cleanly in spreadsheet tools.
#[derive(Debug, Serialize)]
struct EventRow<'a> {
    timestamp: String,
    kind: &'static str,
    symbol: &'a str,
    price: Option<f64>,
    quantity: Option<f64>,
    notional: Option<f64>,
    leverage: Option<f64>,
    pnl: Option<f64>,
    detail: String,
}

impl<'a> EventRow<'a> {
    fn from_event(event: &'a LedgerEvent) -> Self {
        let timestamp = event.timestamp().format("%Y-%m-%d %H:%M:%S").to_string();
        match event {
            LedgerEvent::Entered {
                symbol,
                price,
                quantity,
                notional,
                leverage,
                ..
            } => Self {
                timestamp,
                kind: "ENTERED",
                symbol,
                price: Some(*price),
                quantity: Some(*quantity),
                notional: Some(*notional),
                leverage: Some(*leverage),
                pnl: None,
                detail: String::new(),
            },
            LedgerEvent::Resized {
                symbol,
                price,
                pnl,
                notional_before,
                notional_after,
                ..
            } => Self {
                timestamp,
                kind: "RESIZED",
                symbol,
                price: Some(*price),
                quantity: None,
                notional: Some(*notional_after),
                leverage: None,
                pnl: Some(*pnl),
                detail: format!("from {notional_before:.2}"),
            },
            LedgerEvent::Exited {
                symbol,
                price,
                pnl,
                reason,
                ..
            } => Self {
                timestamp,
                kind: "EXITED",
                symbol,
                price: Some(*price),
                quantity: None,
                notional: None,
                leverage: None,
                pnl: Some(*pnl),
                detail: reason.to_string(),
            },
            LedgerEvent::Stopped {
                symbol,
                trigger_price,
                pnl,
                ..
            } => Self {
                timestamp,
                kind: "STOPPED",
                symbol,
                price: Some(*trigger_price),
                quantity: None,
                notional: None,
                leverage: None,
                pnl: Some(*pnl),
                detail: String::new(),
            },
            LedgerEvent::BarSkipped { reason, .. } => Self {
                timestamp,
                kind: "BAR_SKIPPED",
                symbol: "",
                price: None,
                quantity: None,
                notional: None,
                leverage: None,
                pnl: None,
                detail: reason.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct EquityRow {
    timestamp: String,
    equity: f64,
}

#[derive(Debug, Serialize)]
struct DailyRow {
    date: String,
    equity: f64,
}

/// Writes the per-bar marked equity curve.
pub fn write_equity_curve(path: &Path, result: &BacktestResult) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_err(path))?;
    for point in &result.equity_curve {
        writer
            .serialize(EquityRow {
                timestamp: point.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                equity: point.equity,
            })
            .map_err(csv_err(path))?;
    }
    writer.flush().map_err(|source| ReportError::Csv {
        path: path.display().to_string(),
        source: csv::Error::from(source),
    })?;
    Ok(())
}

/// Writes the end-of-day realized equity series.
pub fn write_daily_equity(path: &Path, result: &BacktestResult) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_err(path))?;
    for point in &result.daily_equity {
        writer
            .serialize(DailyRow {
                date: point.date.format("%Y-%m-%d").to_string(),
                equity: point.equity,
            })
            .map_err(csv_err(path))?;
    }
    writer.flush().map_err(|source| ReportError::Csv {
        path: path.display().to_string(),
        source: csv::Error::from(source),
    })?;
    Ok(())
}

/// Writes the flattened event tape.
pub fn write_event_tape(path: &Path, result: &BacktestResult) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_err(path))?;
    for event in &result.events {
        writer
            .serialize(EventRow::from_event(event))
            .map_err(csv_err(path))?;
    }
    writer.flush().map_err(|source| ReportError::Csv {
        path: path.display().to_string(),
        source: csv::Error::from(source),
    })?;
    Ok(())
}
