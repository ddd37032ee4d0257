//! DriveBench CLI
//!
//! The `drivebench` command assesses driving agents against a held-out
//! scenario set.
//!
//! ## Commands
//!
//! - `assess`: Run one assessment and write the leaderboard artifacts
//! - `validate`: Run the judge self-check table
//! - `split`: Show the train/test partition and a sampled batch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use drivebench_core::{
    generate_artifacts, run_self_check, Assessor, BenchConfig, DriverTransport,
    InProcessTransport, ModelDriver, RemoteTransport, RunHistory, RunResult, ScenarioStore,
    ScoringEngine,
};
use drivebench_llm::build_model;

#[derive(Parser)]
#[command(name = "drivebench")]
#[command(author = "DriveBench Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Assessment engine for vision-conditioned driving agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "DRIVEBENCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess one driver and update the leaderboard
    Assess {
        /// Name the result is stored under
        #[arg(short, long)]
        agent: String,

        /// Dataset root containing images/ and descriptions/
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Number of test scenarios (0 runs the whole test partition)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Remote driver endpoint; the local driver model is used when unset
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Local driver model name
        #[arg(long)]
        driver_model: Option<String>,

        /// Fixed seed for the test sample and few-shot examples
        #[arg(long)]
        seed: Option<u64>,

        /// Directory for tournament_results.json and leaderboard.md
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the judge self-check table
    Validate,

    /// Print the train/test partition and a sampled test batch
    Split {
        /// Dataset root containing images/ and descriptions/
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Partition seed
        #[arg(long)]
        split_seed: Option<u64>,

        /// Sampling seed for the printed batch
        #[arg(long)]
        seed: Option<u64>,

        /// Batch size (0 samples the whole test partition)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    drivebench_core::telemetry::init_tracing(cli.json, level);

    let config = BenchConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Assess {
            agent,
            dataset,
            limit,
            endpoint,
            driver_model,
            seed,
            output,
        } => {
            let mut config = config;
            if let Some(path) = dataset {
                config.dataset.path = path;
            }
            if let Some(limit) = limit {
                config.dataset.limit = limit_or_all(limit);
            }
            if let Some(endpoint) = endpoint {
                config.driver.endpoint = Some(endpoint);
            }
            if let Some(model) = driver_model {
                config.driver.model.model = model;
            }
            if seed.is_some() {
                config.dataset.sampling_seed = seed;
            }
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            cmd_assess(&config, &agent, cli.json).await
        }
        Commands::Validate => cmd_validate(&config, cli.json).await,
        Commands::Split {
            dataset,
            split_seed,
            seed,
            limit,
        } => {
            let mut config = config;
            if let Some(path) = dataset {
                config.dataset.path = path;
            }
            if let Some(split_seed) = split_seed {
                config.dataset.split_seed = split_seed;
            }
            if seed.is_some() {
                config.dataset.sampling_seed = seed;
            }
            if let Some(limit) = limit {
                config.dataset.limit = limit_or_all(limit);
            }
            cmd_split(&config, cli.json)
        }
    }
}

fn limit_or_all(limit: usize) -> Option<usize> {
    (limit > 0).then_some(limit)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn driver_transport(config: &BenchConfig) -> Result<Box<dyn DriverTransport>> {
    let timeout = config.driver.timeout();
    match &config.driver.endpoint {
        Some(endpoint) => {
            let transport = RemoteTransport::with_timeout(endpoint, timeout)
                .with_context(|| format!("Invalid driver endpoint '{}'", endpoint))?;
            Ok(Box::new(transport))
        }
        None => {
            let model = build_model(&config.driver.model)
                .context("Failed to build local driver model")?;
            let driver = ModelDriver::new(model);
            Ok(Box::new(
                InProcessTransport::new(Arc::new(driver)).with_timeout(timeout),
            ))
        }
    }
}

/// Assess one agent and write the artifacts
async fn cmd_assess(config: &BenchConfig, agent: &str, json: bool) -> Result<()> {
    let judge = build_model(&config.judge).context("Failed to build judge model")?;
    let history = Arc::new(RunHistory::new());
    let assessor = Assessor::new(judge, Arc::clone(&history), config.assessment_config());
    let transport = driver_transport(config)?;

    info!(agent = %agent, driver = %transport.describe(), "starting assessment");
    let result = assessor
        .run_assessment(
            transport.as_ref(),
            &config.dataset.path,
            config.dataset.limit,
            agent,
        )
        .await
        .with_context(|| format!("Assessment of '{}' failed", agent))?;

    let paths = generate_artifacts(&history, &config.output_dir)?;

    if json {
        return print_json(&drivebench_core::reporting::rounded(&result));
    }
    print_summary(&result);
    println!();
    println!("Results:     {}", paths.results_json.display());
    println!("Leaderboard: {}", paths.leaderboard_md.display());
    Ok(())
}

fn print_summary(result: &RunResult) {
    let summary = &result.summary;
    println!("Agent:      {}", result.agent_name);
    println!("Run:        {}", result.run_id);
    println!(
        "Grade:      {} ({:.1}%)",
        summary.overall_grade, summary.overall_score_percent
    );
    println!("Scenarios:  {}", summary.scenario_count);
    println!(
        "Perception: {:.2}  Prediction: {:.2}  Planning: {:.2}",
        summary.metrics.perception, summary.metrics.prediction, summary.metrics.planning
    );
    println!("Violations: {}", summary.metrics.total_violations);
    println!("Latency:    {:.2}s mean", result.mean_latency());

    for (title, items) in [
        ("Strengths", &summary.analysis.strengths),
        ("Weaknesses", &summary.analysis.weaknesses),
        ("Recommendations", &summary.analysis.recommendations),
    ] {
        if items.is_empty() {
            continue;
        }
        println!();
        println!("{}:", title);
        for item in items {
            println!("  - {}", item);
        }
    }
}

/// Run the self-check table against the configured judge
async fn cmd_validate(config: &BenchConfig, json: bool) -> Result<()> {
    let judge = build_model(&config.judge).context("Failed to build judge model")?;
    let engine = ScoringEngine::new(judge, config.scoring.clone());
    let report = run_self_check(&engine).await;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Self-check: {}/{} passed ({:.1}%)",
            report.passed,
            report.total,
            report.accuracy_percent()
        );
        for failure in &report.failures {
            println!(
                "  FAIL [{:?}] scene='{}' plan='{}' violations={:?}",
                failure.expected, failure.scene, failure.plan, failure.violations
            );
        }
    }

    if !report.all_passed() {
        anyhow::bail!(
            "{} of {} self-check cases failed",
            report.total - report.passed,
            report.total
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct SplitView<'a> {
    dataset: &'a Path,
    split_seed: u64,
    digest: String,
    train: usize,
    test: usize,
    sampling_seed: Option<u64>,
    batch: &'a [String],
    few_shot_pool: usize,
}

/// Show partition sizes and one sampled batch
fn cmd_split(config: &BenchConfig, json: bool) -> Result<()> {
    let store = ScenarioStore::open_with_split(
        &config.dataset.path,
        config.dataset.split_seed,
        config.dataset.split,
    )
    .with_context(|| format!("Failed to open dataset {:?}", config.dataset.path))?;
    let batch = store.prepare_runtime_batch(config.dataset.limit, config.dataset.sampling_seed);

    let view = SplitView {
        dataset: store.root(),
        split_seed: store.seed(),
        digest: store.partition_digest(),
        train: store.train().len(),
        test: store.test().len(),
        sampling_seed: config.dataset.sampling_seed,
        batch: batch.test_files(),
        few_shot_pool: batch.train_pool().len(),
    };

    if json {
        return print_json(&view);
    }
    println!("Dataset:   {}", view.dataset.display());
    println!("Seed:      {}", view.split_seed);
    println!("Digest:    {}", view.digest);
    println!("Train:     {}", view.train);
    println!("Test:      {}", view.test);
    println!(
        "Batch ({} scenarios, few-shot pool {}):",
        view.batch.len(),
        view.few_shot_pool
    );
    for file in view.batch {
        println!("  {}", file);
    }
    Ok(())
}
