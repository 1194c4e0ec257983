//! Decision robustness CLI
//!
//! Run with: cargo run -p project-sim --bin robustness -- <command>
//!
//! Examples:
//!   robustness evaluate --policy aggressive --worlds 1000
//!   robustness evaluate --policy balanced --executor isolated --json --output balanced.json
//!   robustness compare --worlds 500 --seed 7

use clap::{Args, Parser, Subcommand};
use project_sim::{
    compare_policies, comparison_table, EvaluationError, PolicyEvaluation, PolicyKind,
    RobustnessConfig, RobustnessConfigError,
};
use sim_core::ExecutorType;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Stress-test project management policies across thousands of simulated futures
#[derive(Parser, Debug)]
#[command(name = "robustness")]
#[command(about = "Evaluate decision policies by their failure modes, not their averages")]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one policy and print its diagnostics
    Evaluate(EvaluateArgs),
    /// Evaluate every built-in policy and print a summary table
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Policy to evaluate (aggressive, conservative, balanced)
    #[arg(short, long, default_value = "balanced")]
    policy: PolicyKind,

    #[command(flatten)]
    swarm: SwarmArgs,

    /// Emit diagnostics as JSON
    #[arg(long)]
    json: bool,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[command(flatten)]
    swarm: SwarmArgs,

    /// Emit every policy's diagnostics as JSON
    #[arg(long)]
    json: bool,
}

/// Overrides applied on top of the configuration file.
#[derive(Args, Debug)]
struct SwarmArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of worlds to simulate
    #[arg(short, long)]
    worlds: Option<usize>,

    /// Base seed; world i runs with seed + i
    #[arg(short, long)]
    seed: Option<u64>,

    /// Weeks before a project times out
    #[arg(long)]
    max_steps: Option<u64>,

    /// Parallel workers (defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Executor type (thread, isolated)
    #[arg(long)]
    executor: Option<ExecutorType>,

    /// Per-world timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,
}

impl SwarmArgs {
    fn load(&self) -> Result<RobustnessConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => RobustnessConfig::from_file(path)?,
            None => RobustnessConfig::default(),
        };

        if let Some(worlds) = self.worlds {
            config.swarm.n_worlds = worlds;
        }
        if let Some(seed) = self.seed {
            config.swarm.base_seed = seed;
        }
        if let Some(max_steps) = self.max_steps {
            config.simulator.max_steps = max_steps;
        }
        if let Some(workers) = self.workers {
            config.swarm.max_workers = Some(workers);
        }
        if let Some(executor) = self.executor {
            config.swarm.executor_type = executor;
        }
        if let Some(timeout) = self.timeout {
            config.swarm.timeout_seconds = Some(timeout);
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] RobustnessConfigError),
    #[error("{0}")]
    Evaluation(#[from] EvaluationError),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging; reports go to stdout, logs to stderr
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install log subscriber: {}", e);
    }

    let result = match cli.command {
        Command::Evaluate(args) => evaluate(args),
        Command::Compare(args) => compare(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn evaluate(args: EvaluateArgs) -> Result<(), CliError> {
    let config = args.swarm.load()?;
    tracing::info!(
        policy = %args.policy,
        worlds = config.swarm.n_worlds,
        max_steps = config.simulator.max_steps,
        executor = %config.swarm.executor_type,
        "Evaluating policy"
    );

    let evaluation = PolicyEvaluation::run(args.policy, &config)?;
    let report = if args.json {
        evaluation.to_json()?
    } else {
        evaluation.report()
    };

    match &args.output {
        Some(path) => {
            write_report(path, &report)?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => println!("{}", report),
    }
    Ok(())
}

fn compare(args: CompareArgs) -> Result<(), CliError> {
    let config = args.swarm.load()?;
    tracing::info!(
        worlds = config.swarm.n_worlds,
        max_steps = config.simulator.max_steps,
        "Comparing built-in policies"
    );

    let evaluations = compare_policies(&config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&evaluations)?);
    } else {
        println!("{}", comparison_table(&evaluations));
    }
    Ok(())
}

fn write_report(path: &Path, report: &str) -> Result<(), CliError> {
    std::fs::write(path, report).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}
