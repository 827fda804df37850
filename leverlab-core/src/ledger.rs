//! EquityLedger — position lifecycle and realized/unrealized accounting.
//!
//! The ledger turns a target exposure (mode, symbol, leverage) into entries,
//! exits, resizes, and stops over at most one open position. Cash equity
//! changes only at realization events; mark-to-market equity is transient and
//! used for the equity stop and drawdown tracking only.

use crate::config::{ConfigError, FillConvention, LedgerConfig, RebalancePolicy};
use crate::domain::{ExitReason, LedgerEvent, MarketBar, Mode, Position, SkipReason};
use crate::engine::Decision;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal accounting errors. Data-quality conditions (bad prices, NaN fields)
/// are NOT errors — they surface as `LedgerEvent::BarSkipped` warnings.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("bar day {got} precedes ledger day {current} — bars must arrive in increasing day order")]
    DayRegression { current: NaiveDate, got: NaiveDate },
}

/// Snapshot of ledger health for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub cash_equity: f64,
    pub day_start_equity: f64,
    pub peak_equity: f64,
    pub max_drawdown_pct: f64,
}

/// Tracks cash, the single open position, and day-scoped stop state.
#[derive(Debug, Clone)]
pub struct EquityLedger {
    config: LedgerConfig,
    cash_equity: f64,
    day_start_equity: f64,
    peak_equity: f64,
    max_drawdown_pct: f64,
    current_day: Option<NaiveDate>,
    position: Option<Position>,
    /// Equity stop already fired today — no re-check until the day rolls.
    stopped_today: bool,
}

impl EquityLedger {
    pub fn new(config: LedgerConfig, initial_capital: f64) -> Result<Self, ConfigError> {
        config.validate()?;
        if !(initial_capital > 0.0) || !initial_capital.is_finite() {
            return Err(ConfigError::BadInitialCapital(initial_capital));
        }
        Ok(Self {
            config,
            cash_equity: initial_capital,
            day_start_equity: initial_capital,
            peak_equity: initial_capital,
            max_drawdown_pct: 0.0,
            current_day: None,
            position: None,
            stopped_today: false,
        })
    }

    pub fn cash_equity(&self) -> f64 {
        self.cash_equity
    }

    pub fn day_start_equity(&self) -> f64 {
        self.day_start_equity
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            cash_equity: self.cash_equity,
            day_start_equity: self.day_start_equity,
            peak_equity: self.peak_equity,
            max_drawdown_pct: self.max_drawdown_pct,
        }
    }

    /// Cash plus unrealized P&L marked at this bar's close. Transient —
    /// reporting and drawdown only, never written back into cash.
    pub fn marked_equity(&self, bar: &MarketBar) -> f64 {
        match &self.position {
            Some(pos) => {
                let price = bar
                    .quote(&pos.symbol)
                    .map(|q| q.close)
                    .filter(|p| p.is_finite() && *p > 0.0)
                    .unwrap_or(pos.entry_price);
                self.cash_equity + pos.unrealized_pnl(price)
            }
            None => self.cash_equity,
        }
    }

    /// Execute one bar's target exposure. Event order within a bar: stop
    /// check first (worst-case intrabar fill), then rule-driven exits, then
    /// entry or resize.
    pub fn apply(
        &mut self,
        decision: &Decision,
        bar: &MarketBar,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let day = bar.day();
        if let Some(current) = self.current_day {
            if day < current {
                return Err(LedgerError::DayRegression { current, got: day });
            }
        }
        // Day-start snapshot happens before any stop check for the day.
        if self.current_day != Some(day) {
            self.current_day = Some(day);
            self.day_start_equity = self.cash_equity;
            self.stopped_today = false;
        }

        let mut events = Vec::new();

        if decision.no_op {
            events.push(LedgerEvent::BarSkipped {
                timestamp: bar.timestamp,
                reason: SkipReason::NanInput,
            });
            self.track_drawdown(bar);
            return Ok(events);
        }

        if !(self.day_start_equity > 0.0) || !self.day_start_equity.is_finite() {
            events.push(LedgerEvent::BarSkipped {
                timestamp: bar.timestamp,
                reason: SkipReason::BadDayStartEquity,
            });
            return Ok(events);
        }

        self.check_equity_stop(bar, &mut events);
        self.check_rule_exits(decision, bar, &mut events);

        match (&self.position, decision.position_fraction > 0.0) {
            (None, true) => self.try_enter(decision, bar, &mut events),
            (Some(_), true) => self.try_resize(decision, bar, &mut events),
            _ => {}
        }

        self.track_drawdown(bar);
        Ok(events)
    }

    /// Force-close at the day's last bar. The strategy is intraday; nothing
    /// is held overnight.
    pub fn close_end_of_day(&mut self, bar: &MarketBar) -> Vec<LedgerEvent> {
        let mut events = Vec::new();
        if let Some(pos) = self.position.take() {
            let price = bar
                .quote(&pos.symbol)
                .map(|q| q.close)
                .filter(|p| p.is_finite() && *p > 0.0)
                .unwrap_or(pos.entry_price);
            let pnl = pos.unrealized_pnl(price);
            self.cash_equity += pnl;
            events.push(LedgerEvent::Exited {
                timestamp: bar.timestamp,
                symbol: pos.symbol,
                price,
                pnl,
                reason: ExitReason::EndOfDay,
            });
        }
        self.track_drawdown(bar);
        events
    }

    // ── Per-bar phases ─────────────────────────────────────────────────

    /// Equity stop, measured against day-start equity with the bar's
    /// low (long) / high (short) as the worst-case trigger price. Fires at
    /// `stop_pct + stop_buffer` drawdown; the realized loss is capped at
    /// exactly `stop_pct × day_start_equity`, modeling a stop order filled
    /// at its trigger rather than the intrabar extreme.
    fn check_equity_stop(&mut self, bar: &MarketBar, events: &mut Vec<LedgerEvent>) {
        if self.stopped_today {
            return;
        }
        let Some(pos) = &self.position else {
            return;
        };
        let Some(quote) = bar.quote(&pos.symbol) else {
            return;
        };
        let worst_price = match pos.mode {
            Mode::Long => quote.low,
            Mode::Short => quote.high,
            Mode::Neutral => return,
        };
        if !worst_price.is_finite() || worst_price <= 0.0 {
            return;
        }

        let worst_equity = self.cash_equity + pos.unrealized_pnl(worst_price);
        let drawdown = (worst_equity - self.day_start_equity) / self.day_start_equity;
        let effective_stop = self.config.stop_pct + self.config.stop_buffer;

        if drawdown <= -effective_stop {
            let capped_loss = self.day_start_equity * self.config.stop_pct;
            let pnl = -capped_loss;
            let symbol = pos.symbol.clone();
            self.cash_equity = self.day_start_equity + pnl;
            self.position = None;
            self.stopped_today = true;
            events.push(LedgerEvent::Stopped {
                timestamp: bar.timestamp,
                symbol,
                trigger_price: worst_price,
                pnl,
            });
        }
    }

    /// Exits driven by the engine's decision: kill switch, mode flip, asset
    /// switch, or fraction returning to zero. First matching reason wins.
    fn check_rule_exits(
        &mut self,
        decision: &Decision,
        bar: &MarketBar,
        events: &mut Vec<LedgerEvent>,
    ) {
        let Some(pos) = &self.position else {
            return;
        };

        let reason = if !decision.trading_enabled {
            Some(ExitReason::KillSwitch)
        } else if decision.mode != pos.mode {
            Some(ExitReason::ModeFlip)
        } else if decision
            .target_symbol
            .as_deref()
            .is_some_and(|s| s != pos.symbol)
        {
            Some(ExitReason::AssetSwitch)
        } else if decision.position_fraction == 0.0 {
            Some(ExitReason::FractionZero)
        } else {
            None
        };

        if let Some(reason) = reason {
            let pos = self.position.take().expect("position checked above");
            let price = bar
                .quote(&pos.symbol)
                .map(|q| q.close)
                .filter(|p| p.is_finite() && *p > 0.0)
                .unwrap_or(pos.entry_price);
            let pnl = pos.unrealized_pnl(price);
            self.cash_equity += pnl;
            events.push(LedgerEvent::Exited {
                timestamp: bar.timestamp,
                symbol: pos.symbol,
                price,
                pnl,
                reason,
            });
        }
    }

    /// FLAT → OPEN. Notional compounds against current cash equity.
    fn try_enter(&mut self, decision: &Decision, bar: &MarketBar, events: &mut Vec<LedgerEvent>) {
        if !decision.mode.is_directional() || decision.leverage <= 0.0 {
            return;
        }
        let Some(symbol) = decision.target_symbol.as_deref() else {
            return;
        };
        let Some(quote) = bar.quote(symbol) else {
            events.push(LedgerEvent::BarSkipped {
                timestamp: bar.timestamp,
                reason: SkipReason::MissingPrice,
            });
            return;
        };
        let price = match self.config.entry_fill {
            FillConvention::Close => quote.close,
            FillConvention::Open => quote.open,
        };
        if !price.is_finite() || price <= 0.0 {
            events.push(LedgerEvent::BarSkipped {
                timestamp: bar.timestamp,
                reason: SkipReason::BadPrice,
            });
            return;
        }

        let notional = self.cash_equity * decision.leverage;
        let quantity = notional / price;
        self.position = Some(Position {
            symbol: symbol.to_string(),
            entry_price: price,
            quantity,
            notional,
            leverage_at_entry: decision.leverage,
            mode: decision.mode,
        });
        events.push(LedgerEvent::Entered {
            timestamp: bar.timestamp,
            symbol: symbol.to_string(),
            price,
            quantity,
            notional,
            leverage: decision.leverage,
        });
    }

    /// OPEN → OPEN resize: realize at the current price, reopen at the target
    /// size at the same price — a no-slippage rebase. Gating keeps churn out:
    /// the leverage delta must exceed the tolerance, and under the gated
    /// policy the notional delta must exceed the dollar threshold.
    fn try_resize(&mut self, decision: &Decision, bar: &MarketBar, events: &mut Vec<LedgerEvent>) {
        let Some(pos) = &self.position else {
            return;
        };
        debug_assert_eq!(pos.mode, decision.mode, "rule exits run before resize");

        if (decision.leverage - pos.leverage_at_entry).abs() <= self.config.leverage_tolerance {
            return;
        }
        let Some(quote) = bar.quote(&pos.symbol) else {
            return;
        };
        let price = quote.close;
        if !price.is_finite() || price <= 0.0 {
            events.push(LedgerEvent::BarSkipped {
                timestamp: bar.timestamp,
                reason: SkipReason::BadPrice,
            });
            return;
        }

        let pnl = pos.unrealized_pnl(price);
        let realized_equity = self.cash_equity + pnl;
        let target_notional = realized_equity * decision.leverage;
        let current_notional = pos.marked_notional(price);

        if let RebalancePolicy::Gated { min_notional } = self.config.rebalance {
            if (target_notional - current_notional).abs() <= min_notional {
                return;
            }
        }

        let symbol = pos.symbol.clone();
        let notional_before = current_notional;
        self.cash_equity = realized_equity;
        let quantity = target_notional / price;
        self.position = Some(Position {
            symbol: symbol.clone(),
            entry_price: price,
            quantity,
            notional: target_notional,
            leverage_at_entry: decision.leverage,
            mode: decision.mode,
        });
        events.push(LedgerEvent::Resized {
            timestamp: bar.timestamp,
            symbol,
            price,
            pnl,
            notional_before,
            notional_after: target_notional,
        });
    }

    fn track_drawdown(&mut self, bar: &MarketBar) {
        let marked = self.marked_equity(bar);
        if marked > self.peak_equity {
            self.peak_equity = marked;
        }
        if self.peak_equity > 0.0 {
            let dd = (self.peak_equity - marked) / self.peak_equity;
            if dd > self.max_drawdown_pct {
                self.max_drawdown_pct = dd;
            }
        }
    }
}
