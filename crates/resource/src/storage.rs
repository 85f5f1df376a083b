use async_trait::async_trait;
use cartel_traits::storage::check_object_path;
use cartel_traits::{ObjectStorage, SignedUrl, StorageError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A bucket stored as plain files under `root/{bucket}/`.
///
/// Content types are not persisted; everything the pipeline stores is PDF.
#[derive(Debug)]
pub struct FilesystemObjectStorage {
    bucket: String,
    root: PathBuf,
}

impl FilesystemObjectStorage {
    pub fn new<P: AsRef<Path>>(root: P, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        Self {
            root: root.as_ref().join(&bucket),
            bucket,
        }
    }

    fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        check_object_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ObjectStorage for FilesystemObjectStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let target = self.object_path(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, data)
            .await
            .map_err(|e| StorageError::UploadFailed {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        log::debug!("Stored {} ({}) at {}", path, content_type, target.display());
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.object_path(path)?;
        tokio::fs::read(&target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::Io(e.to_string())
            }
        })
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        let target = self.object_path(path)?;
        if !tokio::fs::try_exists(&target).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(SignedUrl::new(&self.bucket, path, ttl).to_string())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        for path in paths {
            let target = self.object_path(path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_objects_under_bucket_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemObjectStorage::new(dir.path(), "carteles");

        storage
            .upload("temp/s1/chunk-0.pdf", b"%PDF-1.7".to_vec(), "application/pdf")
            .await
            .unwrap();
        assert!(dir.path().join("carteles/temp/s1/chunk-0.pdf").exists());
        assert_eq!(storage.download("temp/s1/chunk-0.pdf").await.unwrap(), b"%PDF-1.7");

        let url = storage
            .create_signed_url("temp/s1/chunk-0.pdf", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(storage.download_signed(&url).await.unwrap(), b"%PDF-1.7");

        storage
            .remove(&["temp/s1/chunk-0.pdf".to_string(), "temp/s1/missing.pdf".to_string()])
            .await
            .unwrap();
        assert!(matches!(
            storage.download("temp/s1/chunk-0.pdf").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn signing_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemObjectStorage::new(dir.path(), "carteles");
        assert!(matches!(
            storage.create_signed_url("nope.pdf", Duration::from_secs(1)).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.upload("../escape.pdf", vec![], "application/pdf").await,
            Err(StorageError::InvalidPath(_))
        ));
    }
}
