//! AWS S3 blob backend.
//!
//! Listing narrows server-side on the glob's literal prefix, then filters
//! the returned keys with the full pattern.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{BlobStore, GlobPattern};

/// S3-based archive storage.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create S3 storage with credentials from the default provider chain.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn list(&self, pattern: &GlobPattern) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(pattern.literal_prefix())
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| AppError::storage(e.into_service_error()))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter(|key| pattern.matches(key))
                    .map(str::to_string),
            );
        }

        log::debug!(
            "Listed {} keys in s3://{} for {}",
            keys.len(),
            self.bucket,
            pattern.as_str()
        );
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::storage(service_err))
                }
            }
        }
    }

    async fn get(&self, key: &str, dest: &Path) -> Result<()> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    AppError::no_report(self.location(key))
                } else {
                    AppError::storage(service_err)
                }
            })?;

        let mut body = output.body;
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(AppError::storage)?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        log::info!("Downloaded s3://{}/{} to {}", self.bucket, key, dest.display());
        Ok(())
    }

    async fn put(&self, key: &str, src: &Path) -> Result<()> {
        let body = ByteStream::from_path(src)
            .await
            .map_err(AppError::storage)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::storage(e.into_service_error()))?;

        log::info!("Uploaded {} to s3://{}/{}", src.display(), self.bucket, key);
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
