//! Where archive bytes come from.
//!
//! The extraction engine works on an in-memory buffer; these sources load
//! that buffer from a local path or an HTTP(S) URL.

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::SourceError;

/// Loads a whole archive into memory.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, SourceError>;

    /// Human-readable location, for logs
    fn location(&self) -> &str;

    /// Format hint taken from the location's extension, if any.
    fn format_hint(&self) -> Option<String> {
        Path::new(self.location().split(['?', '#']).next().unwrap_or_default())
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Pick the source matching `location`.
pub fn open_source(location: &str) -> Result<Box<dyn ArchiveSource>, SourceError> {
    if is_http_url(location) {
        Ok(Box::new(HttpSource::new(location.to_string())?))
    } else {
        Ok(Box::new(LocalFile::new(location)))
    }
}

/// Archive on the local filesystem
pub struct LocalFile {
    path: PathBuf,
    display: String,
}

impl LocalFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let display = path.display().to_string();
        Self { path, display }
    }
}

#[async_trait]
impl ArchiveSource for LocalFile {
    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.display.clone(),
                source,
            })
    }

    fn location(&self) -> &str {
        &self.display
    }
}

/// Archive downloaded with a single GET
pub struct HttpSource {
    client: Client,
    url: String,
    max_retry: u32,
}

impl HttpSource {
    pub fn new(url: String) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            url,
            max_retry: 10,
        })
    }
}

#[async_trait]
impl ArchiveSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        let mut retry_count = 0;

        loop {
            match self.client.get(&self.url).send().await {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        return Err(SourceError::Status(resp.status()));
                    }
                    return Ok(resp.bytes().await?.to_vec());
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(SourceError::RetriesExceeded(retry_count));
                    }
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn location(&self) -> &str {
        &self.url
    }
}
