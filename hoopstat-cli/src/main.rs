//! HoopStat CLI: fetch, compare, report, and cache management commands.
//!
//! Commands:
//! - `fetch`: retrieve and enrich players, print per-player results as JSON
//! - `compare`: significance tests and correlations across players
//! - `report`: full performance report, optionally exported to a directory
//! - `cache purge`: drop expired entries from the on-disk cache
//! - `cache invalidate`: drop one player's cached record
//!
//! Results go to stdout as JSON; logs go to stderr (`RUST_LOG` overrides the
//! default `hoopstat=info` filter).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hoopstat_core::data::{
    CacheStore, CircuitBreaker, FileCache, FixtureProvider, MemoryCache, RapidApiProvider,
    RetrievalClient, StatsProvider,
};
use hoopstat_core::domain::SubjectId;
use hoopstat_runner::{
    write_comparison, write_report, DataPipeline, HoopstatConfig, PipelineSettings,
    ReferencePopulation,
};

#[derive(Parser)]
#[command(
    name = "hoopstat",
    about = "HoopStat CLI: basketball player statistics pipeline"
)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read player payloads from this fixture directory instead of the network.
    #[arg(long, global = true)]
    offline: Option<PathBuf>,

    /// Reference population (CSV or TOML). Overrides `reference.path` from the config.
    #[arg(long, global = true)]
    reference: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve and enrich players, printing one result per player.
    Fetch {
        /// Player names (e.g., "LeBron James" "Stephen Curry").
        #[arg(required = true)]
        players: Vec<String>,
    },
    /// Compare players on one or more metrics.
    Compare {
        #[arg(required = true)]
        players: Vec<String>,

        /// Metric to compare (repeatable), e.g. points_per_game.
        #[arg(long = "metric", required = true)]
        metrics: Vec<String>,

        /// Per-game series to correlate each metric against (e.g. minutes).
        #[arg(long)]
        covariate: Option<String>,

        /// Also write the report into this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Generate a full performance report.
    Report {
        #[arg(required = true)]
        players: Vec<String>,

        /// Also write the report into this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove expired entries.
    Purge,
    /// Remove one player's cached record.
    Invalidate { player: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hoopstat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => HoopstatConfig::from_file(path)?,
        None => HoopstatConfig::default(),
    };

    match cli.command {
        Commands::Fetch { players } => {
            let pipeline = build_pipeline(&config, cli.offline.as_deref(), cli.reference.as_deref())?;
            let results = pipeline.fetch_player_data(&subject_ids(&players))?;
            print_json(&results)
        }
        Commands::Compare {
            players,
            metrics,
            covariate,
            output_dir,
        } => {
            let pipeline = build_pipeline(&config, cli.offline.as_deref(), cli.reference.as_deref())?;
            let report =
                pipeline.compare_subjects(&subject_ids(&players), &metrics, covariate.as_deref())?;
            if let Some(dir) = output_dir {
                write_comparison(&dir, &report, chrono::Utc::now())?;
            }
            print_json(&report)
        }
        Commands::Report {
            players,
            output_dir,
        } => {
            let pipeline = build_pipeline(&config, cli.offline.as_deref(), cli.reference.as_deref())?;
            let report = pipeline.generate_performance_report(&subject_ids(&players))?;
            if let Some(dir) = output_dir {
                write_report(&dir, &report)?;
            }
            print_json(&report)
        }
        Commands::Cache { action } => {
            let cache = open_file_cache(&config)?;
            match action {
                CacheAction::Purge => {
                    let removed = cache.purge_expired()?;
                    println!("Removed {removed} expired entr{}", if removed == 1 { "y" } else { "ies" });
                }
                CacheAction::Invalidate { player } => {
                    let id = SubjectId::new(&player);
                    cache.invalidate(&id)?;
                    println!("Invalidated {id}");
                }
            }
            Ok(())
        }
    }
}

fn subject_ids(players: &[String]) -> Vec<SubjectId> {
    players.iter().map(SubjectId::new).collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_file_cache(config: &HoopstatConfig) -> Result<FileCache> {
    let Some(dir) = &config.cache.dir else {
        bail!("no cache directory configured (set `cache.dir` in the config file)");
    };
    Ok(FileCache::open(dir)?)
}

fn build_pipeline(
    config: &HoopstatConfig,
    offline: Option<&Path>,
    reference: Option<&Path>,
) -> Result<DataPipeline> {
    let reference_path = reference
        .or(config.reference.path.as_deref())
        .context("no reference population (pass --reference or set `reference.path`)")?;
    let population = ReferencePopulation::from_path(reference_path)?;

    let cache: Arc<dyn CacheStore> = match &config.cache.dir {
        Some(dir) => Arc::new(FileCache::open(dir)?),
        None => Arc::new(MemoryCache::new()),
    };

    let provider: Arc<dyn StatsProvider> = match offline {
        Some(dir) => Arc::new(FixtureProvider::new(dir)),
        None => Arc::new(RapidApiProvider::new(config.provider.rapidapi_settings()?)?),
    };
    info!(provider = provider.name(), metrics = population.len(), "pipeline configured");

    let breaker = Arc::new(CircuitBreaker::new(
        config.circuit_breaker.failure_threshold,
        config.breaker_cooldown(),
    ));
    let client = RetrievalClient::new(
        provider,
        breaker,
        config.retry.policy(),
        config.pipeline.max_concurrency,
    );

    Ok(DataPipeline::new(
        cache,
        client,
        Arc::new(population),
        PipelineSettings::from_config(config),
    ))
}
