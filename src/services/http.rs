//! Download a report from an export URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;

use super::{ReportSource, expected_filename};
use crate::error::{AppError, Result};
use crate::models::SourceConfig;
use crate::report::ReportKind;
use crate::utils::http::{create_async_client, fetch_bytes};

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: String,
    kind: ReportKind,
}

impl HttpSource {
    pub fn new(config: &SourceConfig, url: &str, kind: ReportKind) -> Result<Self> {
        url::Url::parse(url)?;
        Ok(Self {
            client: create_async_client(config)?,
            url: url.to_string(),
            kind,
        })
    }
}

#[async_trait]
impl ReportSource for HttpSource {
    fn kind(&self) -> ReportKind {
        self.kind
    }

    async fn fetch(&self, download_dir: &Path) -> Result<PathBuf> {
        let body = fetch_bytes(&self.client, &self.url).await?;
        if body.is_empty() {
            return Err(AppError::data_format(&self.url, "export is empty"));
        }
        let dest = download_dir.join(expected_filename(self.kind));
        tokio::fs::write(&dest, &body).await?;
        log::debug!("Fetched {} bytes from {}", body.len(), self.url);
        Ok(dest)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_url() {
        let config = SourceConfig::default();
        assert!(matches!(
            HttpSource::new(&config, "not a url", ReportKind::Waitlist),
            Err(AppError::Url(_))
        ));
    }
}
