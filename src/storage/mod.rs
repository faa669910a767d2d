//! Storage abstractions for the snapshot archive.
//!
//! The archive is an append-only blob namespace. Keys follow the report
//! path codec:
//!
//! ```text
//! {bucket}/
//! ├── dev/
//! │   └── 2025-01-14/
//! │       ├── waitlist-raw-20250114060002.csv
//! │       └── waitlist-processed-20250114060002.parquet
//! └── prod/
//!     └── ...
//! ```
//!
//! Backends only provide put/get/list-by-pattern. Selection, retries and
//! scoped downloads live in [`ReportStore`].

mod glob;
pub mod local;
mod reports;
#[cfg(feature = "s3")]
pub mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use glob::GlobPattern;
pub use local::LocalBlobStore;
pub use reports::{LocalReport, ReportStore};
#[cfg(feature = "s3")]
pub use s3::S3BlobStore;

/// Object-store capability used by the report store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Keys matching `pattern`, in no particular order.
    async fn list(&self, pattern: &GlobPattern) -> Result<Vec<String>>;

    /// Whether `key` is present.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Copy the blob at `key` into the local file `dest`.
    async fn get(&self, key: &str, dest: &Path) -> Result<()>;

    /// Store the local file `src` under `key`.
    async fn put(&self, key: &str, src: &Path) -> Result<()>;

    /// Human-readable location of `key`, for logs.
    fn location(&self, key: &str) -> String;
}
