//! Pick up a report already exported to local disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{ReportSource, expected_filename};
use crate::error::{AppError, Result};
use crate::report::ReportKind;

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    kind: ReportKind,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, kind: ReportKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[async_trait]
impl ReportSource for FileSource {
    fn kind(&self) -> ReportKind {
        self.kind
    }

    /// A missing export is a configuration problem and is not retried.
    async fn fetch(&self, download_dir: &Path) -> Result<PathBuf> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Err(AppError::config(format!(
                "Raw report not found at {}",
                self.path.display()
            )));
        }
        let dest = download_dir.join(expected_filename(self.kind));
        tokio::fs::copy(&self.path, &dest).await?;
        log::debug!("Copied {} to {}", self.path.display(), dest.display());
        Ok(dest)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
