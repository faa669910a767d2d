//! Raw report sources.
//!
//! The upstream report builder is driven by external browser automation;
//! this crate only picks up what it exports. A source delivers one raw CSV
//! into a scratch directory per call:
//!
//! - `FileSource`: an export already on local disk
//! - `HttpSource`: an export URL serving the CSV

mod file;
mod http;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use file::FileSource;
pub use http::HttpSource;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::report::ReportKind;

/// File name the report builder gives each export.
pub fn expected_filename(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Waitlist => {
            "Waitlist___Waiting_List_Status_by_Transplant_Center,_Age,_Waiting_Time.csv"
        }
        ReportKind::Transplant => {
            "Transplant___Waiting_List_Status_at_Transplant_by_Transplant_Center,_Recipient_Age.csv"
        }
    }
}

/// Capability to obtain a fresh raw report.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Which report this source produces.
    fn kind(&self) -> ReportKind;

    /// Place a raw CSV inside `download_dir` and return its path.
    async fn fetch(&self, download_dir: &Path) -> Result<PathBuf>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Source configured by `[source]`; a file takes precedence over a URL.
pub fn from_config(config: &Config, kind: ReportKind) -> Result<Box<dyn ReportSource>> {
    if let Some(file) = &config.source.file {
        return Ok(Box::new(FileSource::new(file, kind)));
    }
    if let Some(url) = &config.source.url {
        return Ok(Box::new(HttpSource::new(&config.source, url, kind)?));
    }
    Err(AppError::config(
        "No report source configured (set REPORT_SOURCE_FILE or REPORT_SOURCE_URL)",
    ))
}
