//! Deterministic synthetic intraday sessions.
//!
//! Generates a correlated ETF pair plus a broad-index return stream and a
//! slow VIX walk, seeded for reproducibility. Used by the CLI demo and by
//! tests that need multi-day bar streams without fixture files.

use std::io::Write;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use leverlab_core::{MarketBar, Quote, StrategyConfig};

use crate::config::DataConfig;
use crate::replay::ReplayError;

/// Regular-session bar count at 5-minute resolution (09:30–16:00).
pub const BARS_PER_SESSION: usize = 78;

/// Parameters for the synthetic generator.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub days: usize,
    pub start_day: NaiveDate,
    /// Per-bar return volatility of the pair.
    pub bar_vol: f64,
    /// Correlation weight between the two pair legs (0..1).
    pub pair_coupling: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            days: 5,
            start_day: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            bar_vol: 0.0018,
            pair_coupling: 0.85,
        }
    }
}

fn session_open(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(9, 30, 0).unwrap()
}

/// Skips weekends; synthetic sessions land on weekdays only.
fn next_trading_day(day: NaiveDate) -> NaiveDate {
    let mut next = day + Duration::days(1);
    while matches!(
        next.weekday(),
        chrono::Weekday::Sat | chrono::Weekday::Sun
    ) {
        next = next + Duration::days(1);
    }
    next
}

/// Uniform return in ±vol, occasionally spiked to push the stream through
/// the entry thresholds.
fn draw_return(rng: &mut StdRng, vol: f64, drift: f64) -> f64 {
    let base = rng.gen_range(-vol..vol) + drift;
    if rng.gen_bool(0.06) {
        base * 3.0
    } else {
        base
    }
}

/// Generates `config.days` sessions of correlated bars for the strategy's
/// symbols, with persistence streaks computed the same way the replay
/// source computes them.
pub fn generate_bars(
    config: &SyntheticConfig,
    strategy: &StrategyConfig,
    data: &DataConfig,
) -> Vec<MarketBar> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut bars = Vec::with_capacity(config.days * BARS_PER_SESSION);
    let mut day = config.start_day;
    let mut vix: f64 = 14.0;
    let mut prices = [210.0_f64, 230.0_f64];

    for _ in 0..config.days {
        // Each session gets a mild directional drift so modes actually form.
        let drift = rng.gen_range(-0.0006..0.0006);
        let mut long_streak: u32 = 0;
        let mut short_streak: u32 = 0;
        let open = session_open(day);

        for i in 0..BARS_PER_SESSION {
            let common = draw_return(&mut rng, config.bar_vol, drift);
            let ret_a = config.pair_coupling * common
                + (1.0 - config.pair_coupling) * draw_return(&mut rng, config.bar_vol, drift);
            let ret_b = config.pair_coupling * common
                + (1.0 - config.pair_coupling) * draw_return(&mut rng, config.bar_vol, drift);
            let ret_secondary = 0.6 * common + draw_return(&mut rng, config.bar_vol * 0.6, 0.0);

            vix = (vix + rng.gen_range(-0.15..0.15)).clamp(10.0, 40.0);

            long_streak = if ret_a > 0.0 && ret_b > 0.0 { long_streak + 1 } else { 0 };
            short_streak = if ret_a < 0.0 && ret_b < 0.0 { short_streak + 1 } else { 0 };

            let timestamp = open + Duration::minutes(5 * i as i64);
            let mut bar = MarketBar::new(timestamp, vix)
                .with_return(&strategy.pair[0], ret_a)
                .with_return(&strategy.pair[1], ret_b)
                .with_return(&strategy.secondary, ret_secondary)
                .with_persistence(
                    long_streak * data.bar_minutes,
                    short_streak * data.bar_minutes,
                );

            for (price, (symbol, ret)) in prices
                .iter_mut()
                .zip([(&strategy.pair[0], ret_a), (&strategy.pair[1], ret_b)])
            {
                let close = *price * (1.0 + ret);
                let span = close * config.bar_vol * 0.8;
                bar = bar.with_quote(
                    symbol,
                    Quote {
                        open: *price,
                        high: close.max(*price) + span,
                        low: close.min(*price) - span,
                        close,
                    },
                );
                *price = close;
            }
            bars.push(bar);
        }
        day = next_trading_day(day);
    }
    bars
}

/// Writes bars to a CSV in the replay schema, so `synth` output feeds
/// straight into `run`.
pub fn write_bars_csv(
    path: &Path,
    bars: &[MarketBar],
    strategy: &StrategyConfig,
) -> Result<(), ReplayError> {
    let mut file = std::fs::File::create(path).map_err(|source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let [a, b] = &strategy.pair;
    let s = &strategy.secondary;
    let mut header = format!("timestamp,{a}_ret,{b}_ret,{s}_ret,vix");
    for symbol in [a, b] {
        header.push_str(&format!(
            ",{symbol}_open,{symbol}_high,{symbol}_low,{symbol}_close"
        ));
    }
    let io_err = |source: std::io::Error| ReplayError::Io {
        path: path.display().to_string(),
        source,
    };
    writeln!(file, "{header}").map_err(io_err)?;

    for bar in bars {
        let mut row = format!(
            "{},{},{},{},{}",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.ret(a),
            bar.ret(b),
            bar.ret(s),
            bar.vix
        );
        for symbol in [a, b] {
            match bar.quote(symbol) {
                Some(q) => {
                    row.push_str(&format!(",{},{},{},{}", q.open, q.high, q.low, q.close))
                }
                None => row.push_str(",,,,"),
            }
        }
        writeln!(file, "{row}").map_err(|source| ReplayError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
