// src/pipeline/read.rs

//! Read invocation: latest processed snapshot as in-memory records.

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{TransplantRecord, WaitlistRecord};
use crate::pipeline::codec::{ParquetRecord, read_records};
use crate::report::{ReportIdentity, ReportKind, ReportSelector, ReportStatus};
use crate::storage::ReportStore;

impl ReportStore {
    /// Download and decode the latest processed snapshot for `selector`.
    ///
    /// The local copy is deleted before returning, on success or failure.
    pub async fn read_processed<R: ParquetRecord>(
        &self,
        selector: ReportSelector,
    ) -> Result<(ReportIdentity, Vec<R>)> {
        let report = self.download_latest(selector).await?;
        let identity = *report.identity();
        let records = read_records(report.path())?;
        report.close()?;
        Ok((identity, records))
    }

    /// Latest processed waitlist, optionally as of one partition date.
    pub async fn read_processed_waitlist(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<(ReportIdentity, Vec<WaitlistRecord>)> {
        self.read_processed(ReportSelector::processed_waitlist().on(date))
            .await
    }

    /// Latest processed transplant report, optionally as of one date.
    pub async fn read_processed_transplants(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<(ReportIdentity, Vec<TransplantRecord>)> {
        let selector =
            ReportSelector::new(ReportKind::Transplant, ReportStatus::Processed).on(date);
        self.read_processed(selector).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::error::AppError;
    use crate::models::Environment;
    use crate::storage::{BlobStore, GlobPattern, LocalBlobStore};
    use crate::utils::retry::RetryPolicy;

    /// Local store that remembers where it last downloaded to.
    struct Recording {
        inner: LocalBlobStore,
        last_dest: Mutex<Option<PathBuf>>,
    }

    #[async_trait]
    impl BlobStore for Recording {
        async fn list(&self, pattern: &GlobPattern) -> Result<Vec<String>> {
            self.inner.list(pattern).await
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key).await
        }

        async fn get(&self, key: &str, dest: &Path) -> Result<()> {
            *self.last_dest.lock().unwrap() = Some(dest.to_path_buf());
            self.inner.get(key, dest).await
        }

        async fn put(&self, key: &str, src: &Path) -> Result<()> {
            self.inner.put(key, src).await
        }

        fn location(&self, key: &str) -> String {
            self.inner.location(key)
        }
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_error_and_removed_locally() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(Recording {
            inner: LocalBlobStore::new(tmp.path().join("archive")),
            last_dest: Mutex::new(None),
        });
        let store = ReportStore::new(backend.clone(), Environment::Dev, RetryPolicy::none());

        let retrieved = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let identity = ReportIdentity::new(
            ReportKind::Waitlist,
            ReportStatus::Processed,
            retrieved,
            Environment::Dev,
        );
        let src = tmp.path().join("not-parquet");
        std::fs::write(&src, "center,count\nCTR1,3\n").unwrap();
        store.upload(&identity, &src).await.unwrap();

        let err = store.read_processed_waitlist(None).await.unwrap_err();
        assert!(matches!(err, AppError::Parquet(_)), "{err}");

        let dest = backend.last_dest.lock().unwrap().clone().unwrap();
        assert!(!dest.exists());
    }
}
