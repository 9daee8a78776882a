/*!
 * memwatch - Main Entry Point
 *
 * Samples one process's memory into rotating logs and reports trends:
 * - `monitor`: select a process, sample until Ctrl+C or exit, then report
 * - `analyze`: report on existing session logs
 * - `list`: show running processes
 */

use std::io;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tokio_util::sync::CancellationToken;
use tracing::info;

use memwatch::config::{ConfigFile, DimensionSwitches, MonitorOverrides};
use memwatch::process::{list_processes, print_table, select_target};
use memwatch::{
    analyze_logs, init_tracing, run_monitor, AnalysisRequest, ArtifactNaming, MemoryUnit,
    MonitorConfig,
};

const DEFAULT_CONFIG_PATH: &str = "memwatch.toml";

#[derive(Parser, Debug)]
#[command(name = "memwatch", version, about = "Process memory monitor and trend analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample a process until interrupted or it exits, then write a report
    Monitor(MonitorArgs),
    /// Analyze existing session logs
    Analyze(AnalyzeArgs),
    /// List running processes
    List,
}

#[derive(Args, Debug)]
struct DisplayArgs {
    /// Leave RSS out of the report and chart
    #[arg(long)]
    no_rss: bool,
    /// Leave private memory out of the report and chart
    #[arg(long)]
    no_private: bool,
    /// Leave virtual memory out of the report and chart
    #[arg(long)]
    no_vms: bool,
}

impl From<&DisplayArgs> for DimensionSwitches {
    fn from(args: &DisplayArgs) -> Self {
        DimensionSwitches {
            no_rss: args.no_rss,
            no_private: args.no_private,
            no_vms: args.no_vms,
        }
    }
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Target process id
    #[arg(long, conflicts_with = "name")]
    pid: Option<u32>,
    /// Case-insensitive process name fragment
    #[arg(long)]
    name: Option<String>,
    /// Seconds between samples
    #[arg(long)]
    interval: Option<u64>,
    /// Directory for session logs
    #[arg(long)]
    log_path: Option<PathBuf>,
    /// Rotate after this many bytes
    #[arg(long)]
    max_log_size: Option<u64>,
    /// Display unit: B, KB, MB or GB
    #[arg(long)]
    unit: Option<MemoryUnit>,
    #[command(flatten)]
    display: DisplayArgs,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Session log segments, oldest first
    #[arg(required = true)]
    logs: Vec<PathBuf>,
    /// TOML config file (only the [analysis] table is used)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Where to write the report and chart (default: next to the first log)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// START,END as HH:MM:SS or YYYY-MM-DD HH:MM:SS
    #[arg(long)]
    time_range: Option<String>,
    #[command(flatten)]
    display: DisplayArgs,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Monitor(args) => monitor(args).await,
        Command::Analyze(args) => analyze(args),
        Command::List => {
            let processes = list_processes();
            print_table(&processes, &mut io::stdout().lock()).into_diagnostic()
        }
    }
}

async fn monitor(args: MonitorArgs) -> miette::Result<()> {
    let file = ConfigFile::load(&args.config)?;
    let overrides = MonitorOverrides {
        pid: args.pid,
        name: args.name,
        interval_secs: args.interval,
        log_dir: args.log_path,
        max_log_size: args.max_log_size,
        unit: args.unit,
        switches: DimensionSwitches::from(&args.display),
    };
    let config = MonitorConfig::resolve(&file, overrides)?;

    let handle = select_target(config.pid, config.name.as_deref())?;
    let (summary, artifacts) = run_monitor(handle, &config, CancellationToken::new()).await?;

    info!(
        samples = summary.samples,
        failures = summary.failures,
        reason = ?summary.stop_reason,
        log = %summary.final_log().map(|p| p.display().to_string()).unwrap_or_default(),
        "monitoring finished"
    );
    if let Some(artifacts) = artifacts {
        println!("Report: {}", artifacts.report.display());
        if let Some(chart) = artifacts.chart {
            println!("Chart:  {}", chart.display());
        }
    }
    Ok(())
}

fn analyze(args: AnalyzeArgs) -> miette::Result<()> {
    let file = ConfigFile::load(&args.config)?;
    let request = AnalysisRequest {
        logs: args.logs,
        output_dir: args.output_dir,
        time_range: args.time_range,
        dimensions: file.dimensions(DimensionSwitches::from(&args.display)),
        naming: ArtifactNaming::Standalone,
    };

    let artifacts = analyze_logs(&request)?;
    println!("Report: {}", artifacts.report.display());
    if let Some(chart) = artifacts.chart {
        println!("Chart:  {}", chart.display());
    }
    Ok(())
}
