//! Report store: selection and retry-guarded transfer of snapshots.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempPath;

use crate::error::{AppError, Result};
use crate::models::{Backend, Config, Environment};
use crate::report::{ReportIdentity, ReportSelector};
use crate::storage::{BlobStore, GlobPattern, LocalBlobStore};
use crate::utils::retry::{RetryPolicy, retry};

/// Snapshot archive scoped to one deployment environment.
#[derive(Clone)]
pub struct ReportStore {
    backend: Arc<dyn BlobStore>,
    environment: Environment,
    retry: RetryPolicy,
}

impl fmt::Debug for ReportStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportStore")
            .field("environment", &self.environment)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ReportStore {
    pub fn new(backend: Arc<dyn BlobStore>, environment: Environment, retry: RetryPolicy) -> Self {
        Self {
            backend,
            environment,
            retry,
        }
    }

    /// Build the store described by a validated configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let environment = config.environment()?;
        let bucket = config.bucket()?;

        let backend: Arc<dyn BlobStore> = match config.store.backend {
            Backend::Local => Arc::new(LocalBlobStore::new(config.store.local_root(bucket))),
            #[cfg(feature = "s3")]
            Backend::S3 => Arc::new(crate::storage::S3BlobStore::from_env(bucket).await),
            #[cfg(not(feature = "s3"))]
            Backend::S3 => {
                return Err(AppError::config(
                    "store.backend = \"s3\" requires the `s3` feature",
                ));
            }
        };

        Ok(Self::new(backend, environment, config.retry.policy()))
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Where an identity lives in the backing namespace.
    pub fn location(&self, identity: &ReportIdentity) -> String {
        self.backend.location(&identity.remote_path())
    }

    /// Every snapshot matching the selector, in unspecified order.
    ///
    /// A key that fails to decode means the archive is corrupt and is an
    /// error, not something to skip.
    pub async fn list_reports(&self, selector: ReportSelector) -> Result<Vec<ReportIdentity>> {
        let glob = GlobPattern::new(selector.glob(self.environment))?;
        let keys = self.backend.list(&glob).await?;
        keys.iter()
            .map(|key| ReportIdentity::decode(key))
            .collect()
    }

    /// Most recently retrieved snapshot matching the selector.
    pub async fn find_latest(&self, selector: ReportSelector) -> Result<ReportIdentity> {
        let reports = self.list_reports(selector).await?;
        let latest = reports
            .into_iter()
            .max_by_key(|report| report.retrieved_at)
            .ok_or_else(|| {
                AppError::no_report(format!("{} in {}", selector, self.environment))
            })?;
        log::info!("Latest {} is {}", selector, latest);
        Ok(latest)
    }

    /// Transfer a snapshot into a fresh temporary file.
    ///
    /// The file is removed when the returned [`LocalReport`] is dropped,
    /// and immediately if the transfer fails.
    pub async fn download(&self, identity: &ReportIdentity) -> Result<LocalReport> {
        let path = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", identity.kind, identity.status))
            .suffix(&format!(".{}", identity.status.extension()))
            .tempfile()?
            .into_temp_path();

        let key = identity.remote_path();
        log::info!("Downloading {} to {}", self.backend.location(&key), path.display());
        retry(&self.retry, &format!("download {key}"), || {
            self.backend.get(&key, &path)
        })
        .await?;

        Ok(LocalReport {
            identity: *identity,
            path,
        })
    }

    /// Find the latest snapshot for the selector and download it.
    pub async fn download_latest(&self, selector: ReportSelector) -> Result<LocalReport> {
        let identity = self.find_latest(selector).await?;
        self.download(&identity).await
    }

    /// Store `local_path` under the identity's remote path.
    ///
    /// An occupied path is never overwritten: it means two invocations
    /// captured in the same second.
    pub async fn upload(&self, identity: &ReportIdentity, local_path: &Path) -> Result<()> {
        if identity.environment != self.environment {
            return Err(AppError::config(format!(
                "cannot upload {} into the {} archive",
                identity, self.environment
            )));
        }

        let key = identity.remote_path();
        let exists = retry(&self.retry, &format!("check {key}"), || {
            self.backend.exists(&key)
        })
        .await?;
        if exists {
            log::error!("Refusing to overwrite {}", self.backend.location(&key));
            return Err(AppError::DuplicateReport { path: key });
        }

        log::info!("Uploading {} to {}", local_path.display(), self.backend.location(&key));
        retry(&self.retry, &format!("upload {key}"), || {
            self.backend.put(&key, local_path)
        })
        .await
    }
}

/// A downloaded snapshot, deleted from local disk on drop.
#[derive(Debug)]
pub struct LocalReport {
    identity: ReportIdentity,
    path: TempPath,
}

impl LocalReport {
    pub fn identity(&self) -> &ReportIdentity {
        &self.identity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the local file now, surfacing any removal error.
    pub fn close(self) -> Result<()> {
        self.path.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::TempDir;

    use super::*;
    use crate::report::{ReportKind, ReportStatus};

    fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn raw(dt: NaiveDateTime) -> ReportIdentity {
        ReportIdentity::new(ReportKind::Waitlist, ReportStatus::Raw, dt, Environment::Dev)
    }

    /// In-memory backend with a scripted number of transient failures.
    #[derive(Default)]
    struct FakeBackend {
        keys: Mutex<Vec<String>>,
        failures_left: AtomicU32,
        gets: AtomicU32,
        puts: AtomicU32,
        last_dest: Mutex<Option<PathBuf>>,
    }

    #[async_trait]
    impl BlobStore for FakeBackend {
        async fn list(&self, pattern: &GlobPattern) -> Result<Vec<String>> {
            let keys = self.keys.lock().unwrap();
            Ok(keys.iter().filter(|k| pattern.matches(k)).cloned().collect())
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            Ok(self.keys.lock().unwrap().iter().any(|k| k == key))
        }

        async fn get(&self, key: &str, dest: &Path) -> Result<()> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            *self.last_dest.lock().unwrap() = Some(dest.to_path_buf());
            if !self.exists(key).await? {
                return Err(AppError::no_report(key));
            }
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::storage("503 Slow Down"));
            }
            std::fs::write(dest, key.as_bytes())?;
            Ok(())
        }

        async fn put(&self, key: &str, _src: &Path) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::storage("connection reset"));
            }
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn location(&self, key: &str) -> String {
            format!("mem://{key}")
        }
    }

    fn store_with(backend: Arc<FakeBackend>) -> ReportStore {
        ReportStore::new(backend, Environment::Dev, RetryPolicy::immediate(5))
    }

    fn seeded(keys: &[String]) -> Arc<FakeBackend> {
        let backend = FakeBackend::default();
        backend.keys.lock().unwrap().extend(keys.iter().cloned());
        Arc::new(backend)
    }

    #[tokio::test]
    async fn latest_ignores_listing_order() {
        let ids = [at(3, 6, 0, 0), at(1, 6, 0, 0), at(9, 6, 0, 0), at(5, 6, 0, 0)].map(raw);
        let keys: Vec<String> = ids.iter().map(ReportIdentity::remote_path).collect();
        let store = store_with(seeded(&keys));

        let selector = ReportSelector::new(ReportKind::Waitlist, ReportStatus::Raw);
        assert_eq!(store.list_reports(selector).await.unwrap().len(), 4);
        assert_eq!(store.find_latest(selector).await.unwrap(), ids[2]);
    }

    #[tokio::test]
    async fn latest_respects_pinned_date() {
        let ids = [at(3, 6, 0, 0), at(3, 18, 0, 0), at(4, 6, 0, 0)].map(raw);
        let keys: Vec<String> = ids.iter().map(ReportIdentity::remote_path).collect();
        let store = store_with(seeded(&keys));

        let selector = ReportSelector::new(ReportKind::Waitlist, ReportStatus::Raw)
            .on(NaiveDate::from_ymd_opt(2025, 1, 3));
        assert_eq!(store.find_latest(selector).await.unwrap(), ids[1]);
    }

    #[tokio::test]
    async fn empty_archive_is_no_report_found() {
        let store = store_with(Arc::new(FakeBackend::default()));
        let err = store
            .find_latest(ReportSelector::processed_waitlist())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoReportFound { .. }));
    }

    #[tokio::test]
    async fn malformed_entry_is_an_error() {
        let keys = vec!["dev/2025-01-01/waitlist-raw-garbage.csv".to_string()];
        let store = store_with(seeded(&keys));
        let err = store
            .list_reports(ReportSelector::new(ReportKind::Waitlist, ReportStatus::Raw))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedPath { .. }));
    }

    #[tokio::test]
    async fn download_retries_then_succeeds() {
        let id = raw(at(2, 1, 2, 3));
        let backend = seeded(&[id.remote_path()]);
        backend.failures_left.store(2, Ordering::SeqCst);
        let store = store_with(backend.clone());

        let local = store.download(&id).await.unwrap();
        assert_eq!(backend.gets.load(Ordering::SeqCst), 3);
        assert_eq!(
            std::fs::read_to_string(local.path()).unwrap(),
            id.remote_path()
        );
        assert!(local.path().to_string_lossy().ends_with(".csv"));
    }

    #[tokio::test]
    async fn download_file_removed_on_drop() {
        let id = raw(at(2, 1, 2, 3));
        let store = store_with(seeded(&[id.remote_path()]));

        let local = store.download(&id).await.unwrap();
        let path = local.path().to_path_buf();
        assert!(path.exists());
        drop(local);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn download_exhaustion_is_transfer_failed() {
        let id = raw(at(2, 1, 2, 3));
        let backend = seeded(&[id.remote_path()]);
        backend.failures_left.store(10, Ordering::SeqCst);
        let store = store_with(backend.clone());

        match store.download(&id).await {
            Err(AppError::TransferFailed { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(backend.gets.load(Ordering::SeqCst), 5);

        let dest = backend.last_dest.lock().unwrap().clone().unwrap();
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn download_of_missing_key_is_not_retried() {
        let backend = Arc::new(FakeBackend::default());
        let store = store_with(backend.clone());

        let err = store.download(&raw(at(2, 1, 2, 3))).await.unwrap_err();
        assert!(matches!(err, AppError::NoReportFound { .. }));
        assert_eq!(backend.gets.load(Ordering::SeqCst), 1);

        let dest = backend.last_dest.lock().unwrap().clone().unwrap();
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn local_download_of_missing_key_fails_immediately() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(
            Arc::new(LocalBlobStore::new(tmp.path())),
            Environment::Dev,
            RetryPolicy::immediate(3),
        );

        let err = store.download(&raw(at(1, 0, 0, 0))).await.unwrap_err();
        assert!(matches!(err, AppError::NoReportFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn upload_of_missing_local_file_fails_immediately() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(
            Arc::new(LocalBlobStore::new(tmp.path().join("archive"))),
            Environment::Dev,
            RetryPolicy::immediate(3),
        );

        let err = store
            .upload(&raw(at(1, 0, 0, 0)), &tmp.path().join("absent.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Io(_)), "{err}");
    }

    #[tokio::test]
    async fn upload_refuses_duplicate_path() {
        let id = raw(at(2, 1, 2, 3));
        let backend = Arc::new(FakeBackend::default());
        let store = store_with(backend.clone());
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("raw.csv");
        std::fs::write(&src, "a,b").unwrap();

        store.upload(&id, &src).await.unwrap();
        let err = store.upload(&id, &src).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateReport { .. }));
        assert_eq!(backend.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upload_rejects_foreign_environment() {
        let store = store_with(Arc::new(FakeBackend::default()));
        let id = ReportIdentity::new(
            ReportKind::Waitlist,
            ReportStatus::Raw,
            at(2, 1, 2, 3),
            Environment::Prod,
        );
        let err = store.upload(&id, Path::new("unused")).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn snapshots_one_second_apart_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(
            Arc::new(LocalBlobStore::new(tmp.path().join("archive"))),
            Environment::Ci,
            RetryPolicy::none(),
        );
        let src = tmp.path().join("raw.csv");
        std::fs::write(&src, "x").unwrap();

        let first = ReportIdentity::new(
            ReportKind::Waitlist,
            ReportStatus::Raw,
            at(7, 23, 59, 59),
            Environment::Ci,
        );
        let second = ReportIdentity::new(
            ReportKind::Waitlist,
            ReportStatus::Raw,
            at(8, 0, 0, 0),
            Environment::Ci,
        );
        store.upload(&first, &src).await.unwrap();
        store.upload(&second, &src).await.unwrap();

        let selector = ReportSelector::new(ReportKind::Waitlist, ReportStatus::Raw);
        assert_eq!(store.list_reports(selector).await.unwrap().len(), 2);
        assert_eq!(store.find_latest(selector).await.unwrap(), second);
    }
}
