use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use marketplace_etl::config::Config;
use marketplace_etl::constants;
use marketplace_etl::infra::http_client::ReqwestHttp;
use marketplace_etl::infra::progress::TracingProgress;
use marketplace_etl::infra::sqlite_sink::SqliteSink;
use marketplace_etl::pipeline::ingestion::snapshot;
use marketplace_etl::pipeline::storage::InMemorySink;
use marketplace_etl::pipeline::{Pipeline, RunRequest};
use marketplace_etl::{logging, metrics};

#[derive(Parser)]
#[command(name = "marketplace_etl")]
#[command(about = "Extract marketplace search listings and load them into SQLite")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FetchArgs {
    /// Search keyword
    #[arg(long, default_value = constants::DEFAULT_QUERY)]
    query: String,
    /// Number of listings to collect
    #[arg(long, default_value_t = constants::DEFAULT_TARGET_COUNT)]
    target: usize,
    /// Listings per request (at most 50)
    #[arg(long, default_value_t = constants::MAX_PAGE_SIZE)]
    page_size: usize,
}

#[derive(Args)]
struct LoadArgs {
    /// SQLite database path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Pass duplicate ids and missing titles through instead of failing
    #[arg(long)]
    lenient: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch listings and version the raw batch to disk
    Extract {
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Normalize a raw snapshot and load it into the database
    Load {
        /// Snapshot file written by `extract`
        #[arg(long)]
        snapshot: PathBuf,
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Run extraction, normalization and loading in one go
    Run {
        #[command(flatten)]
        fetch: FetchArgs,
        #[command(flatten)]
        load: LoadArgs,
        /// Skip writing the raw snapshot
        #[arg(long)]
        no_snapshot: bool,
        /// Normalize without touching the database
        #[arg(long)]
        dry_run: bool,
    },
}

fn open_sink(config: &Config, load: &LoadArgs) -> anyhow::Result<SqliteSink> {
    let db_path = load
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage.db_path));
    let sink = SqliteSink::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    Ok(if config.normalizer.strict_mode {
        sink
    } else {
        sink.allow_duplicate_product_ids()
    })
}

fn build_pipeline(config: &Config, query: &str) -> anyhow::Result<Pipeline> {
    let client = ReqwestHttp::new(&config.fetcher).context("building HTTP client")?;
    Ok(Pipeline::from_config(
        config,
        Arc::new(client),
        Arc::new(TracingProgress::new(format!("Fetching '{}'", query))),
    ))
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(&cli.config).context("loading configuration")?;

    match cli.command {
        Commands::Extract { fetch } => {
            config.snapshot.enabled = true;
            let pipeline = build_pipeline(&config, &fetch.query)?;
            let request = RunRequest {
                query: fetch.query,
                target_count: fetch.target,
                page_size: fetch.page_size,
                snapshot: true,
            };
            let (records, snapshot) = pipeline.extract(&request).await?;
            println!("Extracted {} listings", records.len());
            if let Some(snapshot) = snapshot {
                println!("   Snapshot: {}", snapshot.path.display());
                println!("   SHA-256:  {}", snapshot.sha256);
            }
        }
        Commands::Load { snapshot: path, load } => {
            if load.lenient {
                config.normalizer.strict_mode = false;
            }
            let records = snapshot::read_snapshot(&path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            let pipeline = build_pipeline(&config, "")?;
            let mut sink = open_sink(&config, &load)?;
            let (report, summary) = pipeline.transform_and_load(&records, &mut sink)?;
            sink.close()?;
            println!("Loaded {} listings from {}", report.records_in, path.display());
            print_summary(&report, &summary);
        }
        Commands::Run {
            fetch,
            load,
            no_snapshot,
            dry_run,
        } => {
            if load.lenient {
                config.normalizer.strict_mode = false;
            }
            let pipeline = build_pipeline(&config, &fetch.query)?;
            let request = RunRequest {
                query: fetch.query,
                target_count: fetch.target,
                page_size: fetch.page_size,
                snapshot: !no_snapshot,
            };

            let result = if dry_run {
                let mut sink = InMemorySink::new();
                pipeline.run(&request, &mut sink).await?
            } else {
                let mut sink = open_sink(&config, &load)?;
                let result = pipeline.run(&request, &mut sink).await?;
                sink.close()?;
                result
            };

            println!("Run {} fetched {} listings", result.run_id, result.fetched);
            if let Some(snapshot) = &result.snapshot {
                println!("   Snapshot: {}", snapshot.path.display());
            }
            print_summary(&result.report, &result.load);
        }
    }
    Ok(())
}

fn print_summary(
    report: &marketplace_etl::types::NormalizeReport,
    load: &marketplace_etl::types::LoadSummary,
) {
    println!("   products:           {}", load.products);
    println!("   sellers:            {}", load.sellers);
    println!("   categories:         {}", load.categories);
    println!("   product_categories: {}", load.product_categories);
    if report.categories_dropped_null_id > 0 {
        println!("   categories without id dropped: {}", report.categories_dropped_null_id);
    }
    if report.associations_dropped_dangling > 0 {
        println!(
            "   associations with unknown category dropped: {}",
            report.associations_dropped_dangling
        );
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => info!("Done"),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("Run failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
