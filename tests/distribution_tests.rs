mod common;

use async_trait::async_trait;
use cartel::distribution::{
    ComposerMergeFunction, DistributionError, InMemorySendRepository, RepositoryError, SendRepository,
};
use cartel::download::{DownloadError, DownloadManager, PdfFetcher};
use cartel::pipeline::{DistributionConfig, RetryPolicy};
use cartel::{Branch, PosterPipeline, SendOrchestrator, SendRequest};
use cartel_resource::InMemoryObjectStorage;
use cartel_traits::{MergeError, MergeFunction, MergeRequest, ObjectStorage, StorageError};
use cartel_types::{DeliveryStatus, SendBatch, SendId, SendItem, SendStatus};
use chrono::{DateTime, Utc};
use common::fixtures::small_batch;
use common::{ParsedPdf, TestResult, test_pipeline};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Records every request before handing it to the real merge.
#[derive(Debug)]
struct RecordingMerge {
    inner: ComposerMergeFunction,
    requests: Mutex<Vec<MergeRequest>>,
}

#[async_trait]
impl MergeFunction for RecordingMerge {
    async fn invoke(&self, request: &MergeRequest) -> Result<(), MergeError> {
        self.requests.lock().unwrap().push(request.clone());
        self.inner.invoke(request).await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[derive(Debug)]
struct UnavailableMerge;

#[async_trait]
impl MergeFunction for UnavailableMerge {
    async fn invoke(&self, _request: &MergeRequest) -> Result<(), MergeError> {
        Err(MergeError::Failed("service unavailable".into()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Accepts everything except marking a send as sent.
#[derive(Debug, Default)]
struct RejectsSent {
    inner: InMemorySendRepository,
}

#[async_trait]
impl SendRepository for RejectsSent {
    async fn create_send(&self, batch: SendBatch) -> Result<(), RepositoryError> {
        self.inner.create_send(batch).await
    }

    async fn set_status(&self, id: &SendId, status: SendStatus, error: Option<String>) -> Result<(), RepositoryError> {
        if status == SendStatus::Sent {
            return Err(RepositoryError::Backend("status store offline".into()));
        }
        self.inner.set_status(id, status, error).await
    }

    async fn add_items(&self, items: Vec<SendItem>) -> Result<(), RepositoryError> {
        self.inner.add_items(items).await
    }

    async fn get_send(&self, id: &SendId) -> Result<SendBatch, RepositoryError> {
        self.inner.get_send(id).await
    }

    async fn list_sends(&self) -> Result<Vec<SendBatch>, RepositoryError> {
        self.inner.list_sends().await
    }

    async fn items_for(&self, id: &SendId) -> Result<Vec<SendItem>, RepositoryError> {
        self.inner.items_for(id).await
    }

    async fn get_item(&self, item_id: &str) -> Result<SendItem, RepositoryError> {
        self.inner.get_item(item_id).await
    }

    async fn mark_downloaded(&self, item_id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.inner.mark_downloaded(item_id, at).await
    }
}

/// Mints a distinct signed URL on every request, as expiring URLs do across seconds.
#[derive(Debug)]
struct FreshUrls {
    inner: InMemoryObjectStorage,
    minted: AtomicUsize,
}

#[async_trait]
impl ObjectStorage for FreshUrls {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.inner.upload(path, data, content_type).await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.download(path).await
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        let n = self.minted.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}&n={}", self.inner.create_signed_url(path, ttl).await?, n))
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        self.inner.remove(paths).await
    }
}

/// Blocks inside `fetch` until released, recording each URL.
#[derive(Debug, Default)]
struct GatedFetcher {
    urls: Mutex<Vec<String>>,
    started: Notify,
    release: Notify,
}

#[async_trait]
impl PdfFetcher for GatedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.urls.lock().unwrap().push(url.to_string());
        self.started.notify_one();
        self.release.notified().await;
        Ok(b"%PDF-1.7\n%gated\n".to_vec())
    }
}

struct Harness {
    storage: Arc<InMemoryObjectStorage>,
    repository: Arc<InMemorySendRepository>,
    merge: Arc<RecordingMerge>,
    orchestrator: SendOrchestrator,
}

fn pipeline() -> Arc<PosterPipeline> {
    Arc::new(test_pipeline().expect("pipeline builds"))
}

fn harness(config: DistributionConfig) -> Harness {
    let storage = Arc::new(InMemoryObjectStorage::new("carteles"));
    let repository = Arc::new(InMemorySendRepository::new());
    let merge = Arc::new(RecordingMerge {
        inner: ComposerMergeFunction::new(storage.clone()),
        requests: Mutex::new(Vec::new()),
    });
    let orchestrator = SendOrchestrator::new(pipeline(), storage.clone(), merge.clone(), repository.clone())
        .with_config(config);
    Harness {
        storage,
        repository,
        merge,
        orchestrator,
    }
}

fn request(posters: usize, branches: &[&str]) -> SendRequest {
    SendRequest {
        template_name: "Oferta semanal".into(),
        template_id: Some("tpl-1".into()),
        created_by: "marketing@example.com".into(),
        posters: small_batch(posters),
        branches: branches
            .iter()
            .map(|id| Branch::new(*id, format!("Sucursal {}", id)))
            .collect(),
    }
}

#[tokio::test]
async fn test_batch_at_chunk_size_uses_direct_path() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let h = harness(DistributionConfig::default());
    let outcome = h.orchestrator.send(request(10, &["centro", "norte"])).await?;

    assert!(!outcome.chunked);
    assert_eq!(outcome.chunk_count, 1);
    assert!(h.merge.requests.lock().unwrap().is_empty());

    let listing = h.storage.listing();
    assert_eq!(listing.len(), 2);
    for item in &outcome.items {
        assert_eq!(item.pdf_path, format!("{}/{}.pdf", outcome.batch.id, item.branch_id));
        assert_eq!(listing.get(&item.pdf_path).map(String::as_str), Some("application/pdf"));
        assert_eq!(item.status, DeliveryStatus::Pending);
    }

    let pdf = ParsedPdf::from_bytes(h.storage.download(&outcome.items[0].pdf_path).await?)?;
    assert_pdf_page_count!(pdf, 10);

    let stored = h.repository.get_send(&outcome.batch.id).await?;
    assert_eq!(stored.status, SendStatus::Sent);
    assert_eq!(stored.product_count, 10);
    assert_eq!(h.repository.items_for(&outcome.batch.id).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_batch_above_chunk_size_is_chunked_and_merged() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let h = harness(DistributionConfig::default());
    let outcome = h.orchestrator.send(request(11, &["centro"])).await?;

    assert!(outcome.chunked);
    assert_eq!(outcome.chunk_count, 2);

    let requests = h.merge.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].pdf_urls.len(), 2);
    assert_eq!(requests[0].final_path, format!("temp/{}/merged.pdf", outcome.batch.id));
    assert!(requests[0].pdf_urls[0].contains(&format!("temp/{}/chunk-0.pdf", outcome.batch.id)));
    assert!(requests[0].pdf_urls[1].contains(&format!("temp/{}/chunk-1.pdf", outcome.batch.id)));

    // Intermediates are cleaned up; only the branch copy remains.
    let listing = h.storage.listing();
    assert_eq!(listing.keys().cloned().collect::<Vec<_>>(), vec![outcome.items[0].pdf_path.clone()]);

    let pdf = ParsedPdf::from_bytes(h.storage.download(&outcome.items[0].pdf_path).await?)?;
    assert_pdf_page_count!(pdf, 11);
    Ok(())
}

#[tokio::test]
async fn test_intermediates_kept_when_cleanup_disabled() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = DistributionConfig {
        chunk_size: 2,
        cleanup_temp: false,
        ..DistributionConfig::default()
    };
    let h = harness(config);
    let outcome = h.orchestrator.send(request(5, &["sur"])).await?;
    assert_eq!(outcome.chunk_count, 3);

    let id = &outcome.batch.id;
    for path in [
        format!("temp/{}/chunk-0.pdf", id),
        format!("temp/{}/chunk-1.pdf", id),
        format!("temp/{}/chunk-2.pdf", id),
        format!("temp/{}/merged.pdf", id),
    ] {
        assert!(h.storage.contains(&path), "missing {}", path);
    }
    let chunk = ParsedPdf::from_bytes(h.storage.download(&format!("temp/{}/chunk-2.pdf", id)).await?)?;
    assert_pdf_page_count!(chunk, 1);
    Ok(())
}

#[tokio::test]
async fn test_merge_failure_marks_send_failed() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let storage = Arc::new(InMemoryObjectStorage::new("carteles"));
    let repository = Arc::new(InMemorySendRepository::new());
    let orchestrator = SendOrchestrator::new(pipeline(), storage.clone(), Arc::new(UnavailableMerge), repository.clone());

    let err = orchestrator.send(request(12, &["centro"])).await.unwrap_err();
    assert!(matches!(err, DistributionError::Merge(_)));

    // Chunks uploaded before the failed merge are removed too.
    assert!(storage.listing().is_empty(), "leftovers: {:?}", storage.listing());

    let sends = repository.list_sends().await?;
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].status, SendStatus::Failed);
    assert!(sends[0].error.as_deref().unwrap_or_default().contains("service unavailable"));
    Ok(())
}

#[tokio::test]
async fn test_unrecorded_success_marks_send_failed() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let storage = Arc::new(InMemoryObjectStorage::new("carteles"));
    let repository = Arc::new(RejectsSent::default());
    let orchestrator = SendOrchestrator::new(
        pipeline(),
        storage.clone(),
        Arc::new(ComposerMergeFunction::new(storage.clone())),
        repository.clone(),
    );

    let err = orchestrator.send(request(2, &["centro"])).await.unwrap_err();
    assert!(matches!(err, DistributionError::Repository(_)), "{}", err);

    let sends = repository.inner.list_sends().await?;
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].status, SendStatus::Failed);
    assert!(sends[0].error.as_deref().unwrap_or_default().contains("status store offline"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_batch_marks_send_failed_without_uploads() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let h = harness(DistributionConfig::default());
    let mut req = request(3, &["centro"]);
    req.posters[2].product = serde_json::json!({ "sku": "X" });

    let err = h.orchestrator.send(req).await.unwrap_err();
    assert!(err.to_string().contains("product data for template 3 invalid"));
    assert!(h.storage.listing().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_send_without_branches_is_rejected() -> TestResult {
    let h = harness(DistributionConfig::default());
    let err = h.orchestrator.send(request(1, &[])).await.unwrap_err();
    assert!(matches!(err, DistributionError::NoBranches));
    Ok(())
}

#[tokio::test]
async fn test_download_item_marks_delivery() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let h = harness(DistributionConfig::default());
    let outcome = h.orchestrator.send(request(2, &["centro"])).await?;
    let item = &outcome.items[0];

    let dir = tempfile::tempdir()?;
    let path = h.orchestrator.download_item(&item.id, dir.path()).await?;
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(item.filename.as_str()));
    assert!(std::fs::read(&path)?.starts_with(b"%PDF"));

    let stored = h.repository.get_item(&item.id).await?;
    assert_eq!(stored.status, DeliveryStatus::Delivered);
    assert!(stored.downloaded_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_item_download_is_rejected_despite_fresh_urls() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let storage = Arc::new(FreshUrls {
        inner: InMemoryObjectStorage::new("carteles"),
        minted: AtomicUsize::new(0),
    });
    let repository = Arc::new(InMemorySendRepository::new());
    let fetcher = Arc::new(GatedFetcher::default());
    let orchestrator = SendOrchestrator::new(
        pipeline(),
        storage.clone(),
        Arc::new(ComposerMergeFunction::new(storage.clone())),
        repository.clone(),
    )
    .with_downloader(DownloadManager::new(fetcher.clone(), RetryPolicy::default()));

    let outcome = orchestrator.send(request(1, &["oeste"])).await?;
    let item_id = outcome.items[0].id.clone();
    let dir = tempfile::tempdir()?;

    let first = {
        let orchestrator = orchestrator.clone();
        let item_id = item_id.clone();
        let dest = dir.path().to_path_buf();
        tokio::spawn(async move { orchestrator.download_item(&item_id, &dest).await })
    };
    fetcher.started.notified().await;

    let second = orchestrator.download_item(&item_id, dir.path()).await;
    assert!(
        matches!(second, Err(DistributionError::Download(DownloadError::AlreadyInProgress(_)))),
        "{:?}",
        second
    );

    fetcher.release.notify_one();
    first.await??;
    assert_eq!(fetcher.urls.lock().unwrap().len(), 1);
    assert!(storage.minted.load(Ordering::SeqCst) >= 2);
    assert_eq!(repository.get_item(&item_id).await?.status, DeliveryStatus::Delivered);
    Ok(())
}
