//! PortLab CLI: run and compare portfolio backtests.
//!
//! Commands:
//! - `run`: execute one strategy from an experiment TOML file
//! - `compare`: run every strategy of an experiment in parallel and print
//!   the date-aligned comparison

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use portlab_core::calendar::TradingCalendar;
use portlab_core::data::PriceDataset;
use portlab_runner::batch::{run_batch, BatchOptions, BatchOutcome};
use portlab_runner::compare::{compare, Comparison};
use portlab_runner::config::ExperimentConfig;
use portlab_runner::data_loader::{load_csv_dataset, load_long_csv, synthetic_dataset};
use portlab_runner::export::{export_comparison_csv, save_artifacts};
use portlab_runner::runner::{run_single, RunError};
use portlab_runner::BacktestResult;

#[derive(Parser)]
#[command(name = "portlab", about = "PortLab CLI — portfolio strategy backtesting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single strategy from an experiment file.
    Run {
        /// Path to the experiment TOML file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Strategy label to run. Defaults to the first strategy in the file.
        #[arg(long)]
        strategy: Option<String>,

        /// Write result.json, summary.json and records.csv here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run every strategy of an experiment and compare them on common dates.
    Compare {
        /// Path to the experiment TOML file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Worker threads (0 = one per core).
        #[arg(long, default_value_t = 0)]
        threads: usize,

        /// Also write the comparison table as CSV.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Wide close-price CSV (date,<asset>,...).
    #[arg(long, conflicts_with = "synthetic", required_unless_present = "synthetic")]
    data: Option<PathBuf>,

    /// Read --data as long format (date,asset,close rows).
    #[arg(long, requires = "data", conflicts_with = "fields")]
    long: bool,

    /// Extra field file as NAME=PATH, e.g. market_cap=caps.csv. Repeatable.
    #[arg(long = "field", requires = "data")]
    fields: Vec<String>,

    /// Generate synthetic prices for these comma-separated assets.
    #[arg(long, value_delimiter = ',')]
    synthetic: Option<Vec<String>>,

    /// Synthetic start date (YYYY-MM-DD).
    #[arg(long, default_value = "2019-01-02")]
    start: String,

    /// Synthetic end date (YYYY-MM-DD).
    #[arg(long, default_value = "2023-12-29")]
    end: String,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            strategy,
            output_dir,
        } => run_cmd(config, &data, strategy, output_dir),
        Commands::Compare {
            config,
            data,
            threads,
            output,
        } => compare_cmd(config, &data, threads, output),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_data(args: &DataArgs) -> Result<PriceDataset> {
    if let Some(assets) = &args.synthetic {
        let start = NaiveDate::parse_from_str(&args.start, "%Y-%m-%d")
            .with_context(|| format!("invalid --start '{}'", args.start))?;
        let end = NaiveDate::parse_from_str(&args.end, "%Y-%m-%d")
            .with_context(|| format!("invalid --end '{}'", args.end))?;
        return Ok(synthetic_dataset(assets, start, end)?);
    }

    let Some(path) = &args.data else {
        bail!("one of --data or --synthetic is required");
    };
    if args.long {
        return Ok(load_long_csv(path)?);
    }
    let mut fields = Vec::with_capacity(args.fields.len());
    for spec in &args.fields {
        let Some((name, file)) = spec.split_once('=') else {
            bail!("--field expects NAME=PATH, got '{spec}'");
        };
        fields.push((name.to_string(), PathBuf::from(file)));
    }
    Ok(load_csv_dataset(path, &fields)?)
}

fn run_cmd(
    config_path: PathBuf,
    data: &DataArgs,
    label: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let experiment = ExperimentConfig::load(&config_path)?;
    info!(path = %config_path.display(), "experiment loaded");
    let job = match label {
        Some(label) => experiment.job(&label)?,
        None => experiment
            .jobs()
            .into_iter()
            .next()
            .context("experiment has no strategies")?,
    };

    let dataset = load_data(data)?;
    let calendar = TradingCalendar::from_dataset(&dataset);

    let result = match run_single(&dataset, &calendar, &job) {
        Ok(result) => result,
        Err(err @ RunError::Failed { .. }) => {
            eprintln!(
                "Run failed after {} records",
                err.partial_records().len()
            );
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    print_summary(&result);

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn compare_cmd(
    config_path: PathBuf,
    data: &DataArgs,
    threads: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let experiment = ExperimentConfig::load(&config_path)?;
    info!(
        path = %config_path.display(),
        strategies = experiment.strategies.len(),
        "experiment loaded"
    );
    let dataset = load_data(data)?;
    let calendar = TradingCalendar::from_dataset(&dataset);
    let jobs = experiment.jobs();

    let outcomes = run_batch(
        &dataset,
        &calendar,
        &jobs,
        &BatchOptions {
            threads,
            cancel: None,
        },
    )?;

    let mut completed: Vec<&BacktestResult> = Vec::new();
    for (job, outcome) in jobs.iter().zip(&outcomes) {
        match outcome {
            BatchOutcome::Completed(result) => completed.push(result),
            BatchOutcome::Failed(err) => eprintln!("{}: {err}", job.label),
            BatchOutcome::Cancelled => eprintln!("{}: cancelled", job.label),
        }
    }
    if completed.len() < 2 {
        bail!(
            "comparison needs at least two completed runs, got {}",
            completed.len()
        );
    }

    let comparison = compare(&completed)?;
    print_comparison(&comparison);

    if let Some(path) = output {
        std::fs::write(&path, export_comparison_csv(&comparison)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Comparison saved to: {}", path.display());
    }
    Ok(())
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
}

fn print_summary(result: &BacktestResult) {
    let s = result.statistics();
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {} ({})", result.label, result.strategy);
    println!("Run id:         {}", result.run_id);
    println!(
        "Period:         {} to {}",
        fmt_date(s.start_date),
        fmt_date(s.end_date)
    );
    println!(
        "Sessions:       {} ({} warmup)",
        s.sessions, result.warmup_sessions
    );
    println!("Rebalances:     {}", s.rebalance_count);
    println!("Trades:         {}", s.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", s.total_return * 100.0);
    println!("Ann. Return:    {:.2}%", s.annualized_return * 100.0);
    println!("Ann. Vol:       {:.2}%", s.annualized_volatility * 100.0);
    println!("Sharpe:         {:.3}", s.sharpe);
    println!("Sortino:        {:.3}", s.sortino);
    println!(
        "Max Drawdown:   {:.2}% ({} to {}, recovered {})",
        s.max_drawdown.depth * 100.0,
        fmt_date(s.max_drawdown.peak),
        fmt_date(s.max_drawdown.trough),
        fmt_date(s.max_drawdown.recovery)
    );
    println!(
        "VaR ({:.0}%):      {:.2}%",
        s.var_confidence * 100.0,
        s.var * 100.0
    );
    println!("CVaR:           {:.2}%", s.cvar * 100.0);
    if let Some(win_rate) = s.win_rate {
        println!("Win Rate:       {:.1}%", win_rate * 100.0);
    }
    println!("Turnover:       {:.2}", s.total_turnover);
    println!("Total Cost:     {:.4}%", s.total_cost * 100.0);
    if result.vol_fallbacks > 0 {
        println!("Vol fallbacks:  {}", result.vol_fallbacks);
    }
    println!("Final Equity:   {:.2}", s.final_equity);
}

fn print_comparison(comparison: &Comparison) {
    println!();
    println!(
        "=== Comparison: {} common sessions ({} to {}) ===",
        comparison.dates.len(),
        fmt_date(comparison.dates.first().copied()),
        fmt_date(comparison.dates.last().copied())
    );
    println!(
        "{:<16} {:>8} {:>9} {:>9} {:>8} {:>9} {:>9} {:>8} {:>7}",
        "label", "dropped", "ann.ret", "ann.vol", "sharpe", "max.dd", "excess", "TE", "IR"
    );
    for e in &comparison.entries {
        let s = &e.statistics;
        println!(
            "{:<16} {:>8} {:>8.2}% {:>8.2}% {:>8.3} {:>8.2}% {:>8.2}% {:>7.2}% {:>7}",
            e.label,
            e.excluded_dates,
            s.annualized_return * 100.0,
            s.annualized_volatility * 100.0,
            s.sharpe,
            s.max_drawdown.depth * 100.0,
            e.excess_return * 100.0,
            e.tracking_error * 100.0,
            e.information_ratio
                .map(|ir| format!("{ir:.3}"))
                .unwrap_or_else(|| "-".into()),
        );
    }

    println!();
    println!("--- Return correlation ---");
    for (e, row) in comparison.entries.iter().zip(&comparison.correlation) {
        let cells: Vec<String> = row.iter().map(|c| format!("{c:>6.3}")).collect();
        println!("{:<16} {}", e.label, cells.join(" "));
    }
}
