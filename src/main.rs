use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use hookprof::error::Error;
use hookprof::replay::replay;
use hookprof::trace::load_trace;
use hookprof_runtime::{Profiler, ProfilerConfig, ResultRow, SortKey};

#[derive(Parser)]
#[command(
    name = "hookprof",
    about = "Call-level profiles from recorded hook traces",
    version,
    after_help = "Tunables: HOOKPROF_POOL_SIZE, HOOKPROF_PRECISION, HOOKPROF_LIMIT, HOOKPROF_SPILL_CHUNK"
)]
struct Cli {
    /// Log session activity to stderr (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace and print the profile table.
    Report {
        /// NDJSON trace file.
        trace: PathBuf,

        #[command(flatten)]
        view: View,
    },
    /// Replay a trace and print the ranked rows as JSON.
    Rows {
        /// NDJSON trace file.
        trace: PathBuf,

        #[command(flatten)]
        view: View,
    },
}

#[derive(Args)]
struct View {
    /// Sort key: calls, time, avg_time, mem or avg_mem.
    #[arg(long, default_value = "calls")]
    sort: String,

    /// Maximum number of rows.
    #[arg(long)]
    limit: Option<usize>,

    /// Time quantization step in seconds, e.g. 0.001.
    #[arg(long)]
    precision: Option<f64>,
}

/// One row of `hookprof rows` output.
#[derive(Serialize)]
struct RowJson<'a> {
    rank: usize,
    function: &'a str,
    unit: &'a str,
    line: u32,
    calls: u64,
    time: f64,
    avg_time: Option<f64>,
    memory_kb: f64,
    avg_memory_kb: Option<f64>,
}

impl<'a> From<&'a ResultRow> for RowJson<'a> {
    fn from(row: &'a ResultRow) -> Self {
        Self {
            rank: row.rank,
            function: &row.label,
            unit: &row.location.unit,
            line: row.location.line,
            calls: row.num_calls,
            time: row.time,
            avg_time: row.avg_time,
            memory_kb: row.total_mem,
            avg_memory_kb: row.avg_mem,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Report { trace, view } => cmd_report(&trace, &view),
        Commands::Rows { trace, view } => cmd_rows(&trace, &view),
    }
}

fn config_for(view: &View) -> Result<ProfilerConfig, Error> {
    let mut config = ProfilerConfig::from_env()?;
    if let Some(limit) = view.limit {
        config.limit = limit;
    }
    if let Some(precision) = view.precision {
        if !(precision > 0.0 && precision.is_finite()) {
            return Err(hookprof_runtime::Error::InvalidConfig {
                key: "--precision",
                value: precision.to_string(),
            }
            .into());
        }
        config.precision = precision;
    }
    Ok(config)
}

fn profile(trace: &Path, view: &View) -> Result<(Profiler, SortKey), Error> {
    let sort: SortKey = view.sort.parse()?;
    let config = config_for(view)?;
    let entries = load_trace(trace)?;
    Ok((replay(&entries, config)?, sort))
}

fn cmd_report(trace: &Path, view: &View) -> Result<(), Error> {
    let (profiler, sort) = profile(trace, view)?;
    anstream::print!("{}", profiler.report(sort, None)?);
    Ok(())
}

fn cmd_rows(trace: &Path, view: &View) -> Result<(), Error> {
    let (profiler, sort) = profile(trace, view)?;
    let rows = profiler.results(sort, None);
    let json: Vec<RowJson<'_>> = rows.iter().map(RowJson::from).collect();
    anstream::println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
