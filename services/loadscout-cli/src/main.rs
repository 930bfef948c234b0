use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use loadscout_client::{HttpClientConfig, HttpPresenceClient};
use loadscout_core::{CoreResult, LoadscoutConfig, Population};
use loadscout_engine::{
    CapacitySearch, EngineProbe, LoadEngine, LoadSettings, RunPlan, SearchSettings,
};
use uuid::Uuid;

mod report;
mod telemetry;

use report::{render_run, render_search, OutputFormat, RunReport};

#[derive(Parser, Debug)]
#[command(name = "loadscout")]
#[command(about = "Find the maximum number of concurrent clients a presence service sustains", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (yaml, toml or json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Binary search for the largest population that meets the thresholds
    Search(SearchArgs),

    /// Single timed run at a fixed dispatch rate
    Run(RunArgs),
}

/// Flags shared by both subcommands; each overrides the loaded configuration.
#[derive(Args, Debug)]
struct CommonArgs {
    /// Base URL of the presence service
    #[arg(long, env = "LOADSCOUT_TARGET_URL")]
    target_url: Option<String>,

    /// Per-call timeout in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Number of synthetic client identities
    #[arg(long)]
    population_size: Option<usize>,

    /// Share of heartbeats in the request mix (0.0-1.0)
    #[arg(long)]
    heartbeat_weight: Option<f64>,

    /// Identities per status batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum operations in flight
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Dispatch window of each run in milliseconds
    #[arg(long)]
    run_duration_ms: Option<u64>,

    /// Maximum tolerated error rate (0.0-1.0)
    #[arg(long)]
    error_threshold: Option<f64>,

    /// Maximum tolerated average latency in milliseconds
    #[arg(long)]
    latency_threshold_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Lowest candidate population
    #[arg(long)]
    min_candidate: Option<usize>,

    /// Highest candidate population (defaults to the population size)
    #[arg(long)]
    max_candidate: Option<usize>,

    /// Operations each simulated client issues per second
    #[arg(long)]
    ops_per_client_per_sec: Option<f64>,

    /// Re-runs of the converged value (0 disables)
    #[arg(long)]
    confirm_runs: Option<usize>,

    /// Pause between runs in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Dispatches per second
    #[arg(long)]
    rate: f64,

    /// Identities drawn from (defaults to the population size)
    #[arg(long)]
    clients: Option<usize>,
}

impl CommonArgs {
    fn apply(&self, config: &mut LoadscoutConfig) {
        if let Some(url) = &self.target_url {
            config.target.url = url.clone();
        }
        if let Some(timeout) = self.request_timeout_ms {
            config.target.request_timeout_ms = timeout;
        }
        if let Some(size) = self.population_size {
            config.population.size = size;
        }
        if let Some(weight) = self.heartbeat_weight {
            config.mix.heartbeat_weight = weight;
        }
        if let Some(batch_size) = self.batch_size {
            config.mix.batch_size = batch_size;
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.load.max_concurrency = max_concurrency;
        }
        if let Some(duration) = self.run_duration_ms {
            config.load.run_duration_ms = duration;
        }
        if let Some(threshold) = self.error_threshold {
            config.search.error_threshold = threshold;
        }
        if let Some(threshold) = self.latency_threshold_ms {
            config.search.latency_threshold_ms = threshold;
        }
    }
}

impl SearchArgs {
    fn apply(&self, config: &mut LoadscoutConfig) {
        self.common.apply(config);
        if let Some(min) = self.min_candidate {
            config.search.min_candidate = min;
        }
        if self.max_candidate.is_some() {
            config.search.max_candidate = self.max_candidate;
        }
        if let Some(ops) = self.ops_per_client_per_sec {
            config.load.ops_per_client_per_sec = ops;
        }
        if let Some(runs) = self.confirm_runs {
            config.search.confirm_runs = runs;
        }
        if let Some(cooldown) = self.cooldown_ms {
            config.search.cooldown_ms = cooldown;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_logging(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "loadscout failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Search(args) => {
            let config = resolve_config(cli.config.as_deref(), |config| args.apply(config))?;

            let engine = build_engine(&config)?;
            let probe = EngineProbe::new(
                engine,
                Population::generate(config.population.size),
                LoadSettings {
                    run_duration: config.load.run_duration(),
                    max_concurrency: config.load.max_concurrency,
                    ops_per_client_per_sec: config.load.ops_per_client_per_sec,
                },
            );
            let search = CapacitySearch::new(
                probe,
                SearchSettings {
                    criteria: config.search.criteria(),
                    confirm_runs: config.search.confirm_runs,
                    cooldown: config.search.cooldown(),
                },
            );

            let report = search
                .search(config.search.min_candidate, config.max_candidate())
                .await?;

            println!("{}", render_search(&report, cli.output)?);
            Ok(())
        }

        Commands::Run(args) => {
            let config =
                resolve_config(cli.config.as_deref(), |config| args.common.apply(config))?;

            let clients = args.clients.unwrap_or(config.population.size);
            let population = Population::generate(config.population.size).prefix(clients)?;
            let plan = RunPlan {
                target_rate: args.rate,
                duration: config.load.run_duration(),
                max_concurrency: config.load.max_concurrency,
            };

            let engine = build_engine(&config)?;
            let run_id = Uuid::new_v4();
            let started_at = Utc::now();
            tracing::info!(%run_id, clients, rate = args.rate, "Starting load run");

            let metrics = engine.run(&population, &plan).await?;
            let criteria = config.search.criteria();
            let verdict = criteria.evaluate(&metrics);

            let report = RunReport {
                run_id,
                started_at,
                clients,
                target_rate: args.rate,
                criteria,
                metrics,
                verdict,
            };
            println!("{}", render_run(&report, cli.output)?);
            Ok(())
        }
    }
}

/// Load file and environment layers, apply flag overrides, then validate once.
fn resolve_config(
    path: Option<&Path>,
    apply: impl FnOnce(&mut LoadscoutConfig),
) -> CoreResult<LoadscoutConfig> {
    let mut config = match path {
        Some(path) => LoadscoutConfig::from_file_unvalidated(path)?,
        None => LoadscoutConfig::load_unvalidated()?,
    };
    apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn build_engine(config: &LoadscoutConfig) -> CoreResult<LoadEngine> {
    let mut http = HttpClientConfig::new(config.target.url.clone());
    http.request_timeout = config.target.request_timeout();
    http.max_idle_per_host = config.load.max_concurrency;

    let client = Arc::new(HttpPresenceClient::new(http)?);
    LoadEngine::new(client, config.mix.request_mix())
}
