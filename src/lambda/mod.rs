// src/lambda/mod.rs

//! AWS Lambda handler for the scheduled scrape.
//!
//! Each invocation:
//! 1. Resolves configuration from the environment (S3 backend forced)
//! 2. Fetches the raw export and archives it
//! 3. Transforms it and archives the processed snapshot

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::{Backend, Config};
use crate::pipeline::{ScrapeSummary, run_scrape};
use crate::report::ReportKind;
use crate::services;
use crate::storage::ReportStore;

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    /// Report to scrape; defaults to the waitlist
    #[serde(default)]
    pub kind: Option<ReportKind>,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ScrapeSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<ScrapeRequest>,
) -> std::result::Result<ScrapeResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();
    let kind = request.kind.unwrap_or(ReportKind::Waitlist);

    info!("Starting scrape: kind={}", kind);

    match run(kind).await {
        Ok(summary) => {
            let execution_time_ms = start.elapsed().as_millis() as u64;
            info!(
                "Scrape completed: {} records at {} in {}ms",
                summary.record_count, summary.processed_location, execution_time_ms
            );
            Ok(ScrapeResponse {
                success: true,
                summary: Some(summary),
                error: None,
                execution_time_ms,
            })
        }
        Err(e) => {
            error!("Scrape failed: {}", e);
            Ok(ScrapeResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

async fn run(kind: ReportKind) -> Result<ScrapeSummary> {
    let config = load_lambda_config()?;
    let store = ReportStore::from_config(&config).await?;
    let source = services::from_config(&config, kind)?;
    run_scrape(&config, &store, source.as_ref(), config.now()?).await
}

/// Configuration for the Lambda environment: defaults plus env overrides.
fn load_lambda_config() -> Result<Config> {
    let mut config = Config::default();
    config.store.backend = Backend::S3;
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}
