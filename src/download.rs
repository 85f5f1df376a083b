//! Fetching generated PDFs to local disk.
//!
//! Downloads are deduplicated process-wide: a `(key, filename)` pair that is
//! already in flight is rejected instead of started twice. The key is the URL
//! unless the caller names a stable one, e.g. the object path behind a signed
//! URL that is minted fresh on every request. Each fetch is retried with
//! exponential backoff and every attempt runs under a timeout.

use crate::pipeline::RetryPolicy;
use async_trait::async_trait;
use cartel_traits::ObjectStorage;
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Download already in progress: {0}")]
    AlreadyInProgress(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Download failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("Downloaded content is not a PDF")]
    NotPdf,

    #[error("Invalid file name '{0}'")]
    InvalidFilename(String),

    #[error("Saving the file timed out")]
    SaveTimedOut,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

static IN_FLIGHT: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Holds a slot in the in-flight set; the slot is freed on drop.
#[derive(Debug)]
struct InFlightGuard {
    key: String,
}

impl InFlightGuard {
    fn acquire(key: String) -> Result<Self, DownloadError> {
        let mut in_flight = IN_FLIGHT.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            return Err(DownloadError::AlreadyInProgress(key));
        }
        Ok(Self { key })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        IN_FLIGHT
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Retrieves PDF bytes by URL.
#[async_trait]
pub trait PdfFetcher: Send + Sync + Debug {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// Fetches signed URLs from object storage.
#[derive(Debug, Clone)]
pub struct StorageFetcher {
    storage: Arc<dyn ObjectStorage>,
}

impl StorageFetcher {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl PdfFetcher for StorageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.storage
            .download_signed(url)
            .await
            .map_err(|e| DownloadError::Fetch(e.to_string()))
    }
}

/// Writes fetched bytes to their destination.
#[async_trait]
pub trait PdfSink: Send + Sync + Debug {
    async fn save(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;
}

/// Saves to the local filesystem, creating the parent directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

#[async_trait]
impl PdfSink for FileSink {
    async fn save(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, bytes).await
    }
}

/// Keeps only the final path component and forces a `.pdf` extension.
pub fn sanitize_filename(name: &str) -> Result<String, DownloadError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(DownloadError::InvalidFilename(name.to_string()));
    }
    if base.to_ascii_lowercase().ends_with(".pdf") {
        Ok(base.to_string())
    } else {
        Ok(format!("{}.pdf", base))
    }
}

#[derive(Debug, Clone)]
pub struct DownloadManager {
    fetcher: Arc<dyn PdfFetcher>,
    sink: Arc<dyn PdfSink>,
    policy: RetryPolicy,
}

impl DownloadManager {
    pub fn new(fetcher: Arc<dyn PdfFetcher>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            sink: Arc::new(FileSink),
            policy,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PdfSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Downloads `url` into `dest_dir/filename`, deduplicated by URL.
    pub async fn download(&self, url: &str, filename: &str, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
        self.download_keyed(url, url, filename, dest_dir).await
    }

    /// Downloads `url` into `dest_dir/filename`, deduplicated by `key`.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::AlreadyInProgress` immediately when the same
    /// key and file name are already being downloaded.
    pub async fn download_keyed(
        &self,
        key: &str,
        url: &str,
        filename: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let _guard = InFlightGuard::acquire(format!("{}|{}", key, filename))?;
        let filename = sanitize_filename(filename)?;

        let bytes = self.fetch_with_retry(url).await?;
        if !bytes.starts_with(b"%PDF") {
            return Err(DownloadError::NotPdf);
        }

        let path = dest_dir.join(&filename);
        tokio::time::timeout(self.policy.save_timeout(), self.sink.save(&path, &bytes))
            .await
            .map_err(|_| DownloadError::SaveTimedOut)??;

        log::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Fetches with the policy's attempt budget, timing out each attempt and
    /// sleeping `backoff(n)` after failed attempt `n` when another remains.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let attempts = self.policy.attempts.max(1);
        let mut last = String::new();
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.policy.attempt_timeout(), self.fetcher.fetch(url)).await {
                Ok(Ok(bytes)) => return Ok(bytes),
                Ok(Err(e)) => last = e.to_string(),
                Err(_) => {
                    last = format!("attempt timed out after {:?}", self.policy.attempt_timeout());
                }
            }
            log::warn!("Download attempt {}/{} failed: {}", attempt, attempts, last);
            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }
        Err(DownloadError::Exhausted { attempts, last })
    }
}
