//! rustpwc - PapersWithCode task retrieval and filtering pipeline
//!
//! Retrieves every paper tagged with a PapersWithCode task, then narrows the
//! list by code availability, publication date, an AND-OR keyword query and a
//! NOT keyword query. Each stage's kept and discarded papers are saved.
//!
//! ## Usage
//!
//! ```bash
//! rustpwc run --task 3d-reconstruction --min-date 2018-01-01 --max-date 2023-07-31 \
//!     --and "online,real-time" --not "facial,underwater"
//! rustpwc defaults > run.toml
//! rustpwc run --config run.toml
//! ```

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rustpwc::{
    config::RunConfig,
    enricher::LookupFailurePolicy,
    matcher::{AndOrQuery, NotQuery},
    paperswithcode::PwcClient,
    pipeline,
    report::{self, ReportWriter, Verbosity},
    transcript::{self, Transcript},
};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// PapersWithCode task retrieval and filtering pipeline
#[derive(Parser)]
#[command(name = "rustpwc")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve a task's papers and run the filter pipeline
    Run(RunArgs),

    /// Print the default configuration as TOML
    Defaults,
}

#[derive(clap::Args)]
struct RunArgs {
    /// TOML configuration file (missing keys use defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Task ID from the PapersWithCode URL (e.g., 3d-reconstruction)
    #[arg(long)]
    task: Option<String>,

    /// Listing page size (max 500)
    #[arg(long)]
    items_per_page: Option<u32>,

    /// Earliest publication date kept (YYYY-MM-DD)
    #[arg(long)]
    min_date: Option<NaiveDate>,

    /// Latest publication date kept (YYYY-MM-DD)
    #[arg(long)]
    max_date: Option<NaiveDate>,

    /// One OR-group of comma-separated terms; repeat for AND (e.g., --and "online,real-time" --and "depth")
    #[arg(long = "and", value_name = "TERMS")]
    and_groups: Vec<String>,

    /// Comma-separated exclusion terms
    #[arg(long = "not", value_name = "TERMS")]
    not_terms: Option<String>,

    /// Report layout
    #[arg(long, value_enum)]
    verbosity: Option<Verbosity>,

    /// Do not write reports or log.txt
    #[arg(long)]
    no_save: bool,

    /// Directory receiving the timestamped run folder
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// API base URL
    #[arg(long)]
    api_base: Option<String>,

    /// Concurrent lookup workers (default: available parallelism - 2)
    #[arg(long, conflicts_with = "sequential")]
    workers: Option<usize>,

    /// Run repository lookups one at a time
    #[arg(long)]
    sequential: bool,

    /// What a failed repository lookup means
    #[arg(long, value_enum)]
    lookup_failure: Option<LookupFailurePolicy>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(log_filter(cli.debug))
        .with_target(transcript::SHOW_TARGET)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let config = build_config(args)?;
            run_pipeline(config, cli.debug).await
        }
        Commands::Defaults => {
            print!("{}", RunConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn log_filter(debug: bool) -> EnvFilter {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()))
}

/// Defaults, then the config file, then command-line flags
fn build_config(args: RunArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_toml_file(path).context("Failed to load config file")?,
        None => RunConfig::default(),
    };

    if let Some(task) = args.task {
        config.task_id = task;
    }
    if let Some(items) = args.items_per_page {
        config.items_per_page = items;
    }
    if let Some(date) = args.min_date {
        config.min_date = date;
    }
    if let Some(date) = args.max_date {
        config.max_date = date;
    }
    if !args.and_groups.is_empty() {
        // `--and ","` carries no terms; skip it rather than reject every paper
        let groups = args
            .and_groups
            .iter()
            .map(|g| split_terms(g))
            .filter(|g| !g.is_empty());
        config.and_or_query = AndOrQuery::new(groups);
    }
    if let Some(terms) = args.not_terms {
        config.not_query = NotQuery::new(split_terms(&terms));
    }
    if let Some(verbosity) = args.verbosity {
        config.verbosity = verbosity;
    }
    if args.no_save {
        config.persist = false;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(base) = args.api_base {
        config.api_base = base;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
        config.sequential = false;
    }
    if args.sequential {
        config.sequential = true;
    }
    if let Some(policy) = args.lookup_failure {
        config.lookup_failure = policy;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn split_terms(terms: &str) -> Vec<String> {
    terms
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

// ============================================================================
// Pipeline
// ============================================================================

async fn run_pipeline(config: RunConfig, debug: bool) -> Result<()> {
    let run_folder = if config.persist {
        let folder = report::create_run_folder(&config.output_dir, &Local::now())
            .context("Failed to create output directory")?;
        Some(folder)
    } else {
        None
    };

    // Everything logged from here on is mirrored into log.txt
    let _transcript = match &run_folder {
        Some(folder) => Some(Transcript::open(folder, log_filter(debug)).context("Failed to open log.txt")?),
        None => None,
    };

    let result = execute(&config, run_folder.as_ref()).await;
    if let Err(e) = &result {
        error!("Run aborted: {:#}", e);
    }
    result
}

async fn execute(config: &RunConfig, run_folder: Option<&PathBuf>) -> Result<()> {
    log_parameters(config);

    let client = PwcClient::new(&config.api_base, config.timeout())?;
    let listing = client
        .fetch_task_papers(&config.task_id, config.items_per_page)
        .await
        .context("Failed to retrieve task papers")?;

    let enrich_options = config.enrich_options();
    info!(strategy = %enrich_options.strategy, "Repository lookups");

    let writer = run_folder.map(|folder| ReportWriter::new(folder, config.verbosity));
    let papers = &listing.papers;

    let summary = pipeline::run(
        papers,
        &config.filter_settings(),
        enrich_options,
        |i| client.repository_count(&papers[i].id),
        writer.as_ref(),
    )
    .await
    .context("Filter pipeline failed")?;

    info!(
        total = summary.total,
        kept = summary.survivors.len(),
        "Pipeline complete: {} of {} papers kept",
        summary.survivors.len(),
        summary.total
    );
    if let Some(writer) = &writer {
        info!("Results in: {}", writer.dir().display());
    }
    Ok(())
}

fn log_parameters(config: &RunConfig) {
    info!("{}", Local::now().format("%d %b %Y, %H:%M:%S"));
    info!("task_id: {}", config.task_id);
    info!("items_per_page: {}", config.items_per_page);
    info!("min_date: {}", config.min_date);
    info!("max_date: {}", config.max_date);
    info!("and_or_query: {:?}", config.and_or_query.groups());
    info!("not_query: {:?}", config.not_query.terms());
    info!("verbosity: {:?}", config.verbosity);
}
