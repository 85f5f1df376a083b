//! Object storage seam.
//!
//! The pipeline stores intermediate chunk documents and per-branch copies in a
//! bucket addressed by slash-separated paths. Signed URLs handed to the merge
//! function use the `cartel-storage://{bucket}/{path}?expires={unix}` form.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const SIGNED_URL_SCHEME: &str = "cartel-storage";

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Upload of '{path}' failed: {message}")]
    UploadFailed { path: String, message: String },

    #[error("Invalid signed URL '{0}'")]
    InvalidSignedUrl(String),

    #[error("Signed URL expired: {0}")]
    Expired(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// A parsed signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub bucket: String,
    pub path: String,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
}

impl SignedUrl {
    pub fn new(bucket: &str, path: &str, ttl: Duration) -> Self {
        Self {
            bucket: bucket.to_string(),
            path: path.to_string(),
            expires_at: unix_now().saturating_add(ttl.as_secs()),
        }
    }

    pub fn parse(url: &str) -> Result<Self, StorageError> {
        let invalid = || StorageError::InvalidSignedUrl(url.to_string());
        let rest = url
            .strip_prefix(SIGNED_URL_SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(invalid)?;
        let (location, query) = rest.split_once('?').ok_or_else(invalid)?;
        let (bucket, path) = location.split_once('/').ok_or_else(invalid)?;
        let expires_at = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("expires="))
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        if bucket.is_empty() || path.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            bucket: bucket.to_string(),
            path: path.to_string(),
            expires_at,
        })
    }

    pub fn is_expired(&self) -> bool {
        unix_now() > self.expires_at
    }
}

impl std::fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}/{}?expires={}",
            SIGNED_URL_SCHEME, self.bucket, self.path, self.expires_at
        )
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Rejects empty, absolute and parent-relative object paths.
pub fn check_object_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty() || path.starts_with('/') || path.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + Debug {
    /// Bucket name embedded in signed URLs.
    fn bucket(&self) -> &str;

    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Removes objects. Missing paths are ignored.
    async fn remove(&self, paths: &[String]) -> Result<(), StorageError>;

    /// Resolves a signed URL produced by this storage and downloads the object.
    async fn download_signed(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let signed = SignedUrl::parse(url)?;
        if signed.bucket != self.bucket() {
            return Err(StorageError::InvalidSignedUrl(url.to_string()));
        }
        if signed.is_expired() {
            return Err(StorageError::Expired(url.to_string()));
        }
        self.download(&signed.path).await
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Arc<Vec<u8>>,
    content_type: String,
}

/// Bucket kept in process memory.
#[derive(Debug)]
pub struct InMemoryObjectStorage {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryObjectStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// All stored paths with their content types, sorted by path.
    pub fn listing(&self) -> BTreeMap<String, String> {
        self.objects
            .read()
            .map(|objects| {
                objects
                    .iter()
                    .map(|(path, obj)| (path.clone(), obj.content_type.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .read()
            .map(|o| o.contains_key(path))
            .unwrap_or(false)
    }

    fn poisoned(path: &str) -> StorageError {
        StorageError::Io(format!("object store lock poisoned while accessing '{}'", path))
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        check_object_path(path)?;
        let mut objects = self.objects.write().map_err(|_| Self::poisoned(path))?;
        objects.insert(
            path.to_string(),
            StoredObject {
                data: Arc::new(data),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.read().map_err(|_| Self::poisoned(path))?;
        objects
            .get(path)
            .map(|obj| obj.data.as_ref().clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.contains(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(SignedUrl::new(&self.bucket, path, ttl).to_string())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(|_| Self::poisoned("<batch>"))?;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}
