//! CLI command definitions for simsweep.
//!
//! `run` drives the forwarding study end to end, `aggregate` re-ranks an
//! existing output tree and `list` prints the scenarios a sweep would run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::aggregate::ResultAggregator;
use crate::config::{SweepConfig, DEFAULT_SUMMARY_FILE};
use crate::runner::{SweepReport, SweepRunner};
use crate::sweep::{forwarding_study, ScenarioSet};

/// Default output root for `aggregate`.
const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Batch runner for network simulation parameter sweeps.
#[derive(Parser)]
#[command(name = "simsweep")]
#[command(about = "Run simulation parameter sweeps with bounded concurrency")]
#[command(version)]
#[command(
    long_about = "simsweep runs every scenario of a parameter sweep many times, at most N jobs at once.\n\nEach job runs in its own scratch directory. Statistics files are moved to the output tree and the per-scenario mean ratios are ranked into a summary file.\n\nExample usage:\n  simsweep run --threads 8 --runs 10 --executable build/brite_example"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Build, run every scenario, then rank the results.
    Run(RunArgs),

    /// Rank the statistics already present in an output tree.
    #[command(alias = "agg")]
    Aggregate(AggregateArgs),

    /// Print the scenarios of the forwarding study.
    #[command(alias = "ls")]
    List(ListArgs),
}

/// Arguments for `simsweep run`.
///
/// Unset options fall back to the `SIMSWEEP_*` environment, then to defaults.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Simulator executable.
    #[arg(short = 'e', long)]
    pub executable: Option<PathBuf>,

    /// Build command run once before any job.
    #[arg(long)]
    pub build_command: Option<PathBuf>,

    /// External statistics extractor, invoked with the scratch directory.
    #[arg(long)]
    pub extractor: Option<PathBuf>,

    /// Directory holding the BRITE topology configs.
    #[arg(long)]
    pub topology_dir: Option<PathBuf>,

    /// Maximum number of simultaneous jobs.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Runs per scenario.
    #[arg(short = 'r', long)]
    pub runs: Option<u32>,

    /// Output root for statistics and the summary file.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Scratch root for per-job working directories.
    #[arg(long)]
    pub scratch: Option<PathBuf>,

    /// Delay after each of the first `threads` launches, in seconds.
    #[arg(long)]
    pub stagger_secs: Option<u64>,

    /// Delay between process exit and extraction, in milliseconds.
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Pause after the banner before the first launch, in seconds.
    #[arg(long)]
    pub pause_secs: Option<u64>,

    /// Print the sweep report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl RunArgs {
    /// Applies the explicit flags on top of a base configuration.
    pub fn apply(&self, mut config: SweepConfig) -> SweepConfig {
        if let Some(ref exe) = self.executable {
            config = config.with_executable(exe);
        }
        if let Some(ref build) = self.build_command {
            config = config.with_build_command(build);
        }
        if let Some(ref extractor) = self.extractor {
            config = config.with_extractor_command(extractor);
        }
        if let Some(ref dir) = self.topology_dir {
            config = config.with_topology_dir(dir);
        }
        if let Some(threads) = self.threads {
            config = config.with_capacity(threads);
        }
        if let Some(runs) = self.runs {
            config = config.with_runs_per_scenario(runs);
        }
        if let Some(ref output) = self.output {
            config = config.with_output_root(output);
        }
        if let Some(ref scratch) = self.scratch {
            config = config.with_scratch_root(scratch);
        }
        if let Some(secs) = self.stagger_secs {
            config = config.with_startup_stagger(Duration::from_secs(secs));
        }
        if let Some(ms) = self.settle_ms {
            config = config.with_settle_delay(Duration::from_millis(ms));
        }
        if let Some(secs) = self.pause_secs {
            config = config.with_pre_run_pause(Duration::from_secs(secs));
        }
        config
    }
}

/// Arguments for `simsweep aggregate`.
#[derive(Parser, Debug)]
pub struct AggregateArgs {
    /// Output root containing `<scenario>/output_run<i>/` directories.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Name of the summary file written under the output root.
    #[arg(long, default_value = DEFAULT_SUMMARY_FILE)]
    pub summary_file: String,

    /// Print the ranking as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `simsweep list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Directory holding the BRITE topology configs.
    #[arg(long, default_value = "brite_configs")]
    pub topology_dir: PathBuf,

    /// Runs per scenario, used for the job totals.
    #[arg(short = 'r', long, default_value_t = crate::config::DEFAULT_RUNS_PER_SCENARIO)]
    pub runs: u32,

    /// Print the scenarios as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_sweep_command(args).await,
        Commands::Aggregate(args) => run_aggregate_command(args).await,
        Commands::List(args) => run_list_command(args),
    }
}

// ============================================================================
// Run
// ============================================================================

async fn run_sweep_command(args: RunArgs) -> anyhow::Result<()> {
    let base = SweepConfig::from_env().context("Invalid SIMSWEEP_* environment")?;
    let config = args.apply(base);
    config.validate().context("Invalid sweep options")?;

    let scenarios = forwarding_study(&config.topology_dir)
        .context("Failed to build the forwarding study")?
        .enumerate(config.runs_per_scenario);

    if !args.json {
        println!("We have {} settings", scenarios.len());
        println!("  Runs per setting: {}", config.runs_per_scenario);
        println!("  Total runs:       {}", scenarios.total_jobs());
        println!("  Simultaneous:     {}", config.capacity);
    }

    let report = SweepRunner::new(config)
        .run(&scenarios)
        .await
        .context("Sweep aborted")?;
    print_report(&report, args.json)
}

fn print_report(report: &SweepReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("\n=== Sweep Results ===");
    println!("Completed jobs: {}", report.stats.completed);
    println!("Failed jobs:    {}", report.stats.failed);
    println!("Peak active:    {}", report.stats.peak_active);
    println!("Elapsed:        {}s", report.elapsed().num_seconds());
    println!("Summary file:   {}", report.summary_path.display());
    println!();
    print!("{}", report.summary.to_text());
    for failure in &report.failures {
        println!(
            "  [{}] {} run {}: {}",
            failure.state,
            failure.scenario,
            failure.run_index,
            failure.errors.join("; ")
        );
    }
    println!("We had {} invalid runs", report.invalid_runs());
    Ok(())
}

// ============================================================================
// Aggregate
// ============================================================================

async fn run_aggregate_command(args: AggregateArgs) -> anyhow::Result<()> {
    let aggregator = ResultAggregator::new().with_summary_file(&args.summary_file);
    let summary_path = aggregator.summary_path(&args.output);
    let root = args.output.clone();
    let summary = tokio::task::spawn_blocking(move || aggregator.aggregate(&root))
        .await?
        .with_context(|| format!("Failed to aggregate {}", args.output.display()))?;

    info!(
        scenarios = summary.len(),
        path = %summary_path.display(),
        "Summary written"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.to_text());
        println!("Summary file: {}", summary_path.display());
    }
    Ok(())
}

// ============================================================================
// List
// ============================================================================

#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    name: &'a str,
    runs: u32,
    params: &'a [String],
}

fn run_list_command(args: ListArgs) -> anyhow::Result<()> {
    let scenarios = forwarding_study(&args.topology_dir)?.enumerate(args.runs);
    print_scenarios(&scenarios, args.json)
}

fn print_scenarios(scenarios: &ScenarioSet, json: bool) -> anyhow::Result<()> {
    if json {
        let entries: Vec<ListEntry<'_>> = scenarios
            .iter()
            .map(|s| ListEntry {
                name: &s.name,
                runs: s.repeat_count,
                params: &s.params,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for scenario in scenarios {
        println!("{}  {}", scenario.name, scenario.params.join(" "));
    }
    println!(
        "{} settings, {} total runs",
        scenarios.len(),
        scenarios.total_jobs()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_defaults() {
        let cli = Cli::try_parse_from(["simsweep", "run"]).expect("should parse");
        match cli.command {
            Commands::Run(args) => {
                assert!(args.executable.is_none());
                assert!(args.threads.is_none());
                assert!(args.runs.is_none());
                assert!(!args.json);
            }
            _ => panic!("Expected Run command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_run_command_with_options() {
        let cli = Cli::try_parse_from([
            "simsweep",
            "run",
            "-t",
            "4",
            "-r",
            "10",
            "-e",
            "build/sim",
            "--stagger-secs",
            "0",
            "--settle-ms",
            "250",
            "--json",
            "--log-level",
            "debug",
        ])
        .expect("should parse");

        assert_eq!(cli.log_level, "debug");
        let Commands::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        let config = args.apply(SweepConfig::new());
        assert_eq!(config.capacity, 4);
        assert_eq!(config.runs_per_scenario, 10);
        assert_eq!(config.executable, PathBuf::from("build/sim"));
        assert_eq!(config.startup_stagger, Duration::ZERO);
        assert_eq!(config.settle_delay, Duration::from_millis(250));
        assert!(args.json);
    }

    #[test]
    fn test_apply_keeps_base_when_unset() {
        let base = SweepConfig::new().with_capacity(3).with_runs_per_scenario(7);
        let config = RunArgs::default().apply(base.clone());
        assert_eq!(config.capacity, 3);
        assert_eq!(config.runs_per_scenario, 7);
        assert_eq!(config.output_root, base.output_root);
        assert!(config.build_command.is_none());
    }

    #[test]
    fn test_aggregate_and_list_defaults() {
        let cli = Cli::try_parse_from(["simsweep", "agg"]).expect("should parse");
        match cli.command {
            Commands::Aggregate(args) => {
                assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT_DIR));
                assert_eq!(args.summary_file, DEFAULT_SUMMARY_FILE);
            }
            _ => panic!("Expected Aggregate command"),
        }

        let cli = Cli::try_parse_from(["simsweep", "list", "-r", "3"]).expect("should parse");
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.runs, 3);
                assert_eq!(args.topology_dir, PathBuf::from("brite_configs"));
            }
            _ => panic!("Expected List command"),
        }
    }

    #[tokio::test]
    async fn test_aggregate_command_writes_summary() {
        let temp = tempfile::TempDir::new().unwrap();
        let run_dir = temp.path().join("Alpha/output_run0");
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::write(run_dir.join("n_STATS.txt"), "Ratio:0.5\n").unwrap();

        run_aggregate_command(AggregateArgs {
            output: temp.path().to_path_buf(),
            summary_file: DEFAULT_SUMMARY_FILE.to_string(),
            json: true,
        })
        .await
        .unwrap();

        let written = std::fs::read_to_string(temp.path().join(DEFAULT_SUMMARY_FILE)).unwrap();
        assert_eq!(written, "AVG_RATIO:Alpha:0.5\n");
    }
}
