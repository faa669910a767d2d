//! Local filesystem blob backend.
//!
//! Mirrors the remote namespace under a root directory. Used for
//! development, CI and tests; production deployments use `S3BlobStore`.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── {environment}/
//!     └── YYYY-MM-DD/
//!         └── {kind}-{status}-{timestamp}.{ext}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::{BlobStore, GlobPattern};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root_dir: PathBuf,
}

impl LocalBlobStore {
    /// Create a new store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a key, refusing keys that escape the root.
    fn path(&self, key: &str) -> Result<PathBuf> {
        let key = key.trim_start_matches('/');
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(AppError::malformed_path(key, "key escapes the store root"));
        }
        Ok(self.root_dir.join(key))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Convert an absolute path under the root back into a `/`-separated key.
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root_dir).ok()?;
        let segments: Option<Vec<&str>> = relative.iter().map(|s| s.to_str()).collect();
        Some(segments?.join("/"))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list(&self, pattern: &GlobPattern) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if !tokio::fs::try_exists(&self.root_dir).await? {
            log::warn!("Archive root {} does not exist", self.root_dir.display());
            return Ok(keys);
        }

        let mut pending = vec![self.root_dir.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    match self.key_for(&path) {
                        Some(key) if pattern.matches(&key) => keys.push(key),
                        Some(_) => {}
                        None => log::debug!("Skipping non-UTF-8 path {}", path.display()),
                    }
                }
            }
        }

        log::debug!("Listed {} keys for {}", keys.len(), pattern.as_str());
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(key)?).await?)
    }

    async fn get(&self, key: &str, dest: &Path) -> Result<()> {
        let path = self.path(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(AppError::no_report(path.display().to_string()));
        }
        tokio::fs::copy(&path, dest).await?;
        log::info!("Copied {} to {}", path.display(), dest.display());
        Ok(())
    }

    /// Write atomically (copy to temp, then rename).
    async fn put(&self, key: &str, src: &Path) -> Result<()> {
        let path = self.path(key)?;
        Self::ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        tokio::fs::copy(src, &tmp).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::info!("Stored {}", path.display());
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        self.root_dir.join(key).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn put_bytes(store: &LocalBlobStore, key: &str, bytes: &[u8]) {
        let src = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(src.path(), bytes).unwrap();
        store.put(key, src.path()).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path());

        put_bytes(&store, "dev/2025-01-01/a.csv", b"hello").await;
        assert!(store.exists("dev/2025-01-01/a.csv").await.unwrap());

        let dest = tmp.path().join("out.csv");
        store.get("dev/2025-01-01/a.csv", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_get_missing_is_no_report() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path());
        let err = store
            .get("dev/2025-01-01/nope.csv", &tmp.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoReportFound { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_by_glob() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path().join("bucket"));

        put_bytes(&store, "dev/2025-01-01/waitlist-raw-20250101000000.csv", b"1").await;
        put_bytes(&store, "dev/2025-01-02/waitlist-raw-20250102000000.csv", b"2").await;
        put_bytes(&store, "dev/2025-01-02/waitlist-processed-20250102000000.parquet", b"3").await;
        put_bytes(&store, "prod/2025-01-02/waitlist-raw-20250102000000.csv", b"4").await;

        let glob = GlobPattern::new("dev/*/waitlist-raw-*.csv").unwrap();
        let mut keys = store.list(&glob).await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "dev/2025-01-01/waitlist-raw-20250101000000.csv",
                "dev/2025-01-02/waitlist-raw-20250102000000.csv",
            ]
        );
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path().join("absent"));
        let glob = GlobPattern::new("dev/*/x-*.csv").unwrap();
        assert!(store.list(&glob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path());
        assert!(store.exists("../etc/passwd").await.is_err());
    }
}
