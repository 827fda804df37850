//! Criterion benchmarks for hot paths.
//!
//! Benchmarks:
//! 1. Strategy step over a full synthetic session (78 five-minute bars)
//! 2. Combined step + ledger apply loop (the per-bar backtest inner loop)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{NaiveDate, NaiveDateTime};
use leverlab_core::{
    EquityLedger, LedgerConfig, MarketBar, Quote, StrategyConfig, StrategyEngine, StrategyState,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn session_start(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn make_session(day: u32, bars: usize) -> Vec<MarketBar> {
    let start = session_start(day);
    (0..bars)
        .map(|i| {
            let phase = i as f64 * 0.17;
            let smh = phase.sin() * 0.003;
            let soxx = (phase + 0.05).sin() * 0.0028;
            let qqq = (phase * 0.7).sin() * 0.002;
            let close = 200.0 + phase.sin() * 4.0;
            let streak = ((i % 9) * 5) as u32;
            MarketBar::new(start + chrono::Duration::minutes(5 * i as i64), 14.0)
                .with_return("SMH", smh)
                .with_return("SOXX", soxx)
                .with_return("QQQ", qqq)
                .with_persistence(streak, streak)
                .with_quote(
                    "SMH",
                    Quote {
                        open: close - 0.2,
                        high: close + 0.5,
                        low: close - 0.5,
                        close,
                    },
                )
                .with_quote(
                    "SOXX",
                    Quote {
                        open: close + 19.8,
                        high: close + 20.5,
                        low: close + 19.5,
                        close: close + 20.0,
                    },
                )
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_strategy_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy_step");
    for n_days in [1usize, 5, 20] {
        let sessions: Vec<Vec<MarketBar>> =
            (0..n_days).map(|d| make_session(1 + d as u32, 78)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n_days), &sessions, |b, sessions| {
            let engine = StrategyEngine::new(StrategyConfig::default()).unwrap();
            b.iter(|| {
                let mut state = StrategyState::new();
                for session in sessions {
                    for bar in session {
                        let decision = engine.step(&mut state, bar).unwrap();
                        black_box(decision);
                    }
                }
            });
        });
    }
    group.finish();
}

fn bench_step_and_apply(c: &mut Criterion) {
    let sessions: Vec<Vec<MarketBar>> = (0..5).map(|d| make_session(1 + d as u32, 78)).collect();
    c.bench_function("step_and_apply_5_days", |b| {
        let engine = StrategyEngine::new(StrategyConfig::default()).unwrap();
        b.iter(|| {
            let mut state = StrategyState::new();
            let mut ledger = EquityLedger::new(LedgerConfig::default(), 100_000.0).unwrap();
            for session in &sessions {
                for bar in session {
                    let decision = engine.step(&mut state, bar).unwrap();
                    let events = ledger.apply(&decision, bar).unwrap();
                    black_box(events);
                }
                if let Some(last) = session.last() {
                    black_box(ledger.close_end_of_day(last));
                }
            }
            black_box(ledger.cash_equity())
        });
    });
}

criterion_group!(benches, bench_strategy_step, bench_step_and_apply);
criterion_main!(benches);
