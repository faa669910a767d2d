// src/pipeline/scrape.rs

//! Scrape invocation: fetch, archive raw, transform, archive processed.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::codec::write_records;
use crate::pipeline::{RawTable, transform_transplant, transform_waitlist};
use crate::report::{ReportIdentity, ReportKind, ReportStatus};
use crate::services::ReportSource;
use crate::storage::ReportStore;
use crate::utils::log as console;
use crate::utils::{retry, sha256_hex};

const TOTAL_STEPS: usize = 4;

/// Outcome of one scrape invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSummary {
    pub raw: ReportIdentity,
    pub processed: ReportIdentity,
    pub raw_location: String,
    pub processed_location: String,
    pub record_count: usize,
    pub raw_sha256: String,
}

/// Transform a raw CSV on disk into a processed snapshot on disk.
///
/// Returns the number of records written.
pub fn process_raw_file(
    kind: ReportKind,
    input: &Path,
    output: &Path,
    retrieved_at: NaiveDateTime,
) -> Result<usize> {
    let table = RawTable::from_csv_path(input)?;
    match kind {
        ReportKind::Waitlist => {
            let records = transform_waitlist(&table, retrieved_at)?;
            write_records(output, &records)?;
            Ok(records.len())
        }
        ReportKind::Transplant => {
            let records = transform_transplant(&table, retrieved_at)?;
            write_records(output, &records)?;
            Ok(records.len())
        }
    }
}

/// Run one scrape against `store`, stamping both snapshots with `now`.
///
/// The raw snapshot is archived before transforming, so a schema change
/// upstream still leaves the offending export in the archive.
pub async fn run_scrape(
    config: &Config,
    store: &ReportStore,
    source: &dyn ReportSource,
    now: NaiveDateTime,
) -> Result<ScrapeSummary> {
    let policy = config.retry.policy();
    let raw = ReportIdentity::new(source.kind(), ReportStatus::Raw, now, store.environment());
    let processed = raw.with_status(ReportStatus::Processed);

    console::header(&format!("Scraping {} report ({})", raw.kind, raw.environment));

    let scratch = tempfile::TempDir::new()?;

    console::step(1, TOTAL_STEPS, &format!("Fetching from {}", source.describe()));
    let raw_path = retry(&policy, &format!("fetch {}", raw.kind), || {
        source.fetch(scratch.path())
    })
    .await?;
    let raw_sha256 = sha256_hex(&tokio::fs::read(&raw_path).await?);
    console::sub_item(&format!("sha256 {}", raw_sha256));

    console::step(2, TOTAL_STEPS, &format!("Archiving {}", raw.remote_path()));
    store.upload(&raw, &raw_path).await?;

    console::step(3, TOTAL_STEPS, "Transforming");
    let processed_path = scratch.path().join(processed.filename());
    let record_count = process_raw_file(raw.kind, &raw_path, &processed_path, raw.retrieved_at)?;
    console::sub_item(&format!("{} records", record_count));
    if record_count == 0 {
        log::warn!("Processed {} snapshot holds no records", raw.kind);
    }

    console::step(4, TOTAL_STEPS, &format!("Archiving {}", processed.remote_path()));
    store.upload(&processed, &processed_path).await?;

    let summary = ScrapeSummary {
        raw_location: store.location(&raw),
        processed_location: store.location(&processed),
        raw,
        processed,
        record_count,
        raw_sha256,
    };
    console::summary(
        "Scrape complete",
        &[
            ("raw", summary.raw_location.clone()),
            ("processed", summary.processed_location.clone()),
            ("records", summary.record_count.to_string()),
        ],
    );
    Ok(summary)
}
