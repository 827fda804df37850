//! LeverLab CLI — run, sweep, and synth commands.
//!
//! Commands:
//! - `run` — execute a backtest over a CSV bar file and write artifacts
//! - `sweep` — grid-search risk parameters over the same bar file
//! - `synth` — generate a deterministic synthetic bar file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use leverlab_runner::{
    generate_bars, load_bars, run_backtest, run_sweep, write_bars_csv, write_daily_equity,
    write_equity_curve, write_event_tape, BacktestResult, ParamGrid, RunConfig, SweepCell,
    SyntheticConfig,
};

#[derive(Parser)]
#[command(
    name = "leverlab",
    about = "LeverLab CLI — leveraged intraday pair-momentum backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config over a CSV bar file.
    Run {
        /// Path to a TOML config file. Omit for production defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV bar file (see `synth` for the expected schema).
        #[arg(long)]
        data: PathBuf,

        /// Output directory for CSV artifacts.
        #[arg(long, default_value = "results")]
        out: PathBuf,
    },
    /// Grid-search risk parameters over a CSV bar file.
    Sweep {
        /// Path to a TOML config file for the base cell.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV bar file.
        #[arg(long)]
        data: PathBuf,

        /// Equity-stop levels, comma-separated (e.g. 0.015,0.018,0.022).
        #[arg(long, value_delimiter = ',')]
        stops: Vec<f64>,

        /// Entry-ladder threshold multipliers, comma-separated.
        #[arg(long, value_delimiter = ',')]
        entry_scales: Vec<f64>,

        /// Leverage ceilings, comma-separated.
        #[arg(long, value_delimiter = ',')]
        leverage_caps: Vec<f64>,
    },
    /// Generate a deterministic synthetic bar file.
    Synth {
        /// Number of trading sessions to generate.
        #[arg(long, default_value_t = 5)]
        days: usize,

        /// Generator seed.
        #[arg(long, default_value_t = 7)]
        seed: u64,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, data, out } => cmd_run(config.as_deref(), &data, &out),
        Commands::Sweep {
            config,
            data,
            stops,
            entry_scales,
            leverage_caps,
        } => cmd_sweep(config.as_deref(), &data, stops, entry_scales, leverage_caps),
        Commands::Synth { days, seed, out } => cmd_synth(days, seed, &out),
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_toml_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn cmd_run(config: Option<&Path>, data: &Path, out: &Path) -> Result<()> {
    let config = load_config(config)?;
    let bars = load_bars(data, &config.strategy, &config.data)
        .with_context(|| format!("loading bars from {}", data.display()))?;
    if bars.is_empty() {
        bail!("no bars in {}", data.display());
    }

    let result = run_backtest(&bars, &config)?;

    let run_dir = out.join(&result.run_id[..12]);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating {}", run_dir.display()))?;
    write_equity_curve(&run_dir.join("equity.csv"), &result)?;
    write_daily_equity(&run_dir.join("daily_equity.csv"), &result)?;
    write_event_tape(&run_dir.join("events.csv"), &result)?;
    std::fs::write(
        run_dir.join("metrics.json"),
        serde_json::to_string_pretty(&result.metrics)?,
    )?;

    print_summary(&result);
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn cmd_sweep(
    config: Option<&Path>,
    data: &Path,
    stops: Vec<f64>,
    entry_scales: Vec<f64>,
    leverage_caps: Vec<f64>,
) -> Result<()> {
    let base = load_config(config)?;
    let bars = load_bars(data, &base.strategy, &base.data)
        .with_context(|| format!("loading bars from {}", data.display()))?;

    let grid = if stops.is_empty() && entry_scales.is_empty() && leverage_caps.is_empty() {
        ParamGrid::default()
    } else {
        ParamGrid {
            stop_pcts: stops,
            entry_scales,
            leverage_caps,
        }
    };

    println!("Sweeping {} cells over {} bars...", grid.size(), bars.len());
    let mut cells = run_sweep(&bars, &base, &grid);
    cells.sort_by(|a, b| {
        let ka = cell_return(a);
        let kb = cell_return(b);
        kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
    });

    println!();
    println!(
        "{:<14} {:>8} {:>8} {:>10} {:>9} {:>8} {:>7}",
        "Run", "Stop%", "Rung1bp", "Return%", "MaxDD%", "Sharpe", "Stops"
    );
    println!("{}", "-".repeat(70));
    for cell in &cells {
        match &cell.result {
            Ok(result) => println!(
                "{:<14} {:>8.2} {:>8.2} {:>10.2} {:>9.2} {:>8.3} {:>7}",
                &cell.run_id[..12],
                cell.config.ledger.stop_pct * 100.0,
                cell.config.strategy.entry_ladder.rungs[0].threshold * 10_000.0,
                result.metrics.total_return * 100.0,
                result.metrics.max_drawdown_pct * 100.0,
                result.metrics.sharpe,
                result.metrics.stop_count,
            ),
            Err(err) => println!("{:<14} failed: {err}", &cell.run_id[..12]),
        }
    }
    Ok(())
}

fn cell_return(cell: &SweepCell) -> f64 {
    cell.result
        .as_ref()
        .map(|r| r.metrics.total_return)
        .unwrap_or(f64::NEG_INFINITY)
}

fn cmd_synth(days: usize, seed: u64, out: &Path) -> Result<()> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let config = RunConfig::default();
    let synth = SyntheticConfig {
        seed,
        days,
        ..Default::default()
    };
    let bars = generate_bars(&synth, &config.strategy, &config.data);
    write_bars_csv(out, &bars, &config.strategy)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "Wrote {} bars ({} sessions, seed {}) to {}",
        bars.len(),
        days,
        seed,
        out.display()
    );
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", &result.run_id[..12]);
    println!(
        "Period:         {} to {}",
        result.daily_equity.first().map(|p| p.date.to_string()).unwrap_or_default(),
        result.daily_equity.last().map(|p| p.date.to_string()).unwrap_or_default(),
    );
    println!("Bars:           {} ({} skipped)", result.bar_count, result.skipped_bars);
    println!("Sessions:       {}", result.daily_equity.len().saturating_sub(1));
    println!("Realizations:   {}", result.metrics.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Initial:        ${:.2}", result.initial_capital);
    println!("Final:          ${:.2}", result.final_equity);
    println!(
        "Total Return:   {:.2}%",
        result.metrics.total_return * 100.0
    );
    println!("CAGR:           {:.2}%", result.metrics.cagr * 100.0);
    println!("Sharpe:         {:.3}", result.metrics.sharpe);
    println!("MAR:            {:.3}", result.metrics.mar);
    println!(
        "Max Drawdown:   {:.2}% (${:.2})",
        result.metrics.max_drawdown_pct * 100.0,
        result.metrics.max_drawdown_abs,
    );
    println!("Win Rate:       {:.1}%", result.metrics.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", result.metrics.profit_factor);
    println!("Stops:          {}", result.metrics.stop_count);
    println!("Kill Switches:  {}", result.metrics.kill_switch_count);
    println!();
}
