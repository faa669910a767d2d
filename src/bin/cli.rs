//! Waitlist tracker CLI
//!
//! Local execution entry point. For AWS Lambda, use `waitlist-lambda`.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use waitlist_tracker::{
    error::{AppError, Result},
    geo::{DistanceIndex, HaversineCache},
    models::{Config, Environment, Facility},
    pipeline::{self, Dimension, RecordFilter, summarize},
    report::{DATE_FORMAT, ReportKind, ReportSelector, ReportStatus, TIMESTAMP_FORMAT},
    services::{self, FileSource, HttpSource, ReportSource},
    storage::ReportStore,
};

/// Waitlist tracker - transplant waitlist snapshot archive
#[derive(Parser, Debug)]
#[command(
    name = "waitlist",
    version,
    about = "Archive and query transplant waitlist snapshots"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Archive environment (overrides ENVIRONMENT)
    #[arg(short, long, global = true)]
    env: Option<Environment>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a raw report, archive it, and archive its processed form
    Scrape {
        /// Write to the prod archive (default: dev)
        #[arg(long)]
        prod: bool,

        /// Report to scrape
        #[arg(long, default_value = "waitlist")]
        kind: ReportKind,

        /// Pre-exported raw CSV to pick up
        #[arg(long, conflicts_with = "source_url")]
        source_file: Option<PathBuf>,

        /// Export URL serving the raw CSV
        #[arg(long)]
        source_url: Option<String>,
    },

    /// List archived snapshots, oldest first
    List {
        #[arg(long, default_value = "waitlist")]
        kind: ReportKind,

        #[arg(long, default_value = "processed")]
        status: ReportStatus,

        /// Partition date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Show the most recent snapshot
    Latest {
        #[arg(long, default_value = "waitlist")]
        kind: ReportKind,

        #[arg(long, default_value = "processed")]
        status: ReportStatus,

        /// Partition date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Summarize the latest processed waitlist
    Show {
        /// Partition date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Restrict to one center (and its neighbours with --radius)
        #[arg(long)]
        center: Option<String>,

        /// Radius around --center in nautical miles
        #[arg(long, requires = "center")]
        radius: Option<f64>,

        /// Dimension to total by
        #[arg(long, default_value = "status")]
        group_by: Dimension,
    },

    /// Transform a raw CSV into a processed snapshot file
    Process {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Report variant of the input
        #[arg(long, default_value = "waitlist")]
        variant: ReportKind,

        /// Retrieval time stamped on records (YYYYMMDDHHMMSS; default: now)
        #[arg(long, value_parser = parse_timestamp)]
        retrieved_at: Option<NaiveDateTime>,
    },

    /// Build the pairwise distance file from geocoded facilities
    Geodist {
        /// Facilities JSONL (default: paths.facilities)
        #[arg(long)]
        facilities: Option<PathBuf>,

        /// Distances TSV (default: paths.distances)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List centers within a radius of a center
    Near {
        #[arg(long)]
        center: String,

        /// Radius in nautical miles
        #[arg(long)]
        radius: f64,
    },

    /// Validate configuration
    Validate,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_timestamp(s: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| format!("expected YYYYMMDDHHMMSS: {e}"))
}

/// Initialize logging from the verbosity flag, then the configured level.
fn init_logging(verbose: bool, configured: Option<&str>) {
    let level = if verbose {
        "debug"
    } else {
        configured.unwrap_or("info")
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Facility display labels keyed by code; empty if the file is unavailable.
fn facility_labels(config: &Config) -> HashMap<String, String> {
    match Facility::load_all(&config.paths.facilities) {
        Ok(facilities) => facilities
            .into_iter()
            .map(|f| (f.code.clone(), f.display()))
            .collect(),
        Err(e) => {
            log::debug!(
                "No facility labels from {}: {}",
                config.paths.facilities.display(),
                e
            );
            HashMap::new()
        }
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = Config::load(&cli.config);
    init_logging(
        cli.verbose,
        loaded.as_ref().ok().map(|c| c.logging.level.as_str()),
    );

    // Required settings may still arrive through the environment.
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
        Config::default()
    });
    config.apply_env()?;
    if let Some(env) = cli.env {
        config.store.environment = Some(env);
    }
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Scrape {
            prod,
            kind,
            source_file,
            source_url,
        } => {
            if prod {
                config.store.environment = Some(Environment::Prod);
            } else if config.store.environment.is_none() {
                config.store.environment = Some(Environment::Dev);
            }

            let source: Box<dyn ReportSource> = match (source_file, source_url) {
                (Some(file), _) => Box::new(FileSource::new(file, kind)),
                (None, Some(url)) => Box::new(HttpSource::new(&config.source, &url, kind)?),
                (None, None) => services::from_config(&config, kind)?,
            };

            config.validate()?;
            let store = ReportStore::from_config(&config).await?;
            let now = config.now()?;
            let summary = pipeline::run_scrape(&config, &store, source.as_ref(), now).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::List { kind, status, date } => {
            let store = ReportStore::from_config(&config).await?;
            let selector = ReportSelector::new(kind, status).on(date);
            let mut reports = store.list_reports(selector).await?;
            reports.sort_by_key(|r| r.retrieved_at);

            log::info!("{} snapshot(s) matching {}", reports.len(), selector);
            for report in reports {
                println!("{}\t{}", report.retrieved_at, store.location(&report));
            }
        }

        Command::Latest { kind, status, date } => {
            let store = ReportStore::from_config(&config).await?;
            let selector = ReportSelector::new(kind, status).on(date);
            let latest = store.find_latest(selector).await?;
            println!("{}\t{}", latest.retrieved_at, store.location(&latest));
        }

        Command::Show {
            date,
            center,
            radius,
            group_by,
        } => {
            let store = ReportStore::from_config(&config).await?;
            let (identity, records) = store.read_processed_waitlist(date).await?;
            log::info!("Loaded {} records from {}", records.len(), identity);

            let mut filter = RecordFilter::new();
            if let Some(center) = center {
                let centers = match radius {
                    Some(radius) => {
                        let index = DistanceIndex::load_tsv_path(&config.paths.distances)?;
                        index.within_radius(&center, radius)
                    }
                    None => vec![center],
                };
                let labels = facility_labels(&config);
                for code in &centers {
                    log::info!("Including {}", labels.get(code).unwrap_or(code));
                }
                filter = filter.centers(centers);
            }

            let selected = filter.apply(&records);
            println!("{}\tcount", group_by);
            for (label, total) in summarize(selected, group_by) {
                println!("{}\t{}", label, total);
            }
        }

        Command::Process {
            input,
            output,
            variant,
            retrieved_at,
        } => {
            let retrieved_at = match retrieved_at {
                Some(dt) => dt,
                None => config.now()?,
            };
            let count = pipeline::process_raw_file(variant, &input, &output, retrieved_at)?;
            log::info!(
                "Wrote {} {} records to {}",
                count,
                variant,
                output.display()
            );
        }

        Command::Geodist { facilities, output } => {
            let facilities_path = facilities.unwrap_or_else(|| config.paths.facilities.clone());
            let output = output.unwrap_or_else(|| config.paths.distances.clone());

            let facilities = Facility::load_all(&facilities_path)?;
            let mut cache = HaversineCache::default();
            let index = DistanceIndex::build(&facilities, &mut cache);
            index.write_tsv_path(&output)?;

            log::info!(
                "Wrote distances for {} facilities to {} ({} cache hits)",
                index.len(),
                output.display(),
                cache.hits()
            );
        }

        Command::Near { center, radius } => {
            let index = DistanceIndex::load_tsv_path(&config.paths.distances)?;
            let nearby = index.within_radius(&center, radius);
            if nearby.is_empty() {
                log::warn!("Unknown center {}", center);
            }

            let labels = facility_labels(&config);
            for code in nearby {
                let distance = index.distance(&center, &code).unwrap_or_default();
                let label = labels.get(&code).cloned().unwrap_or_else(|| code.clone());
                println!("{:>8.2}\t{}", distance, label);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            for path in [&config.paths.facilities, &config.paths.distances] {
                if !path.exists() {
                    log::warn!("Reference file {} not found", path.display());
                }
            }

            if config.source.file.is_none() && config.source.url.is_none() {
                return Err(AppError::config("No report source configured"));
            }

            log::info!("All validations passed!");
        }
    }

    Ok(())
}
