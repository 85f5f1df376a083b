use super::merge::PDF_CONTENT_TYPE;
use super::repository::SendRepository;
use super::DistributionError;
use crate::download::{DownloadManager, StorageFetcher};
use crate::error::PipelineError;
use crate::pipeline::{DistributionConfig, GeneratedPdf, PosterPipeline, RetryPolicy, poster_filename};
use crate::validation::{Poster, RawPoster, validate_batch};
use cartel_traits::{MergeFunction, MergeRequest, ObjectStorage};
use cartel_types::{Branch, DeliveryStatus, SendBatch, SendId, SendItem, SendStatus};
use chrono::Utc;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Splits `total` items into consecutive groups of at most `chunk_size`.
pub fn plan_chunks(total: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let size = chunk_size.max(1);
    (0..total).step_by(size).map(|start| start..(start + size).min(total)).collect()
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub template_name: String,
    pub template_id: Option<String>,
    pub created_by: String,
    pub posters: Vec<RawPoster>,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub batch: SendBatch,
    pub items: Vec<SendItem>,
    /// True when the batch went through chunk upload and remote merge.
    pub chunked: bool,
    pub chunk_count: usize,
}

struct FinalDocument {
    bytes: Vec<u8>,
    filename: String,
    chunked: bool,
    chunk_count: usize,
}

/// Drives one send from record creation to per-branch distribution.
///
/// Small batches are generated in one go. Batches above the chunk size are
/// generated chunk by chunk, uploaded to temporary storage and merged
/// remotely, so only one chunk's rasters are held at a time.
#[derive(Debug, Clone)]
pub struct SendOrchestrator {
    pipeline: Arc<PosterPipeline>,
    storage: Arc<dyn ObjectStorage>,
    merger: Arc<dyn MergeFunction>,
    repository: Arc<dyn SendRepository>,
    config: DistributionConfig,
    downloader: DownloadManager,
}

impl SendOrchestrator {
    pub fn new(
        pipeline: Arc<PosterPipeline>,
        storage: Arc<dyn ObjectStorage>,
        merger: Arc<dyn MergeFunction>,
        repository: Arc<dyn SendRepository>,
    ) -> Self {
        let downloader = DownloadManager::new(Arc::new(StorageFetcher::new(storage.clone())), RetryPolicy::default());
        Self {
            pipeline,
            storage,
            merger,
            repository,
            config: DistributionConfig::default(),
            downloader,
        }
    }

    pub fn with_config(mut self, config: DistributionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_downloader(mut self, downloader: DownloadManager) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Creates the send record, distributes the batch and finalizes the record.
    ///
    /// Any failure after the record exists marks it `Failed` with the error
    /// message before the error is returned.
    pub async fn send(&self, request: SendRequest) -> Result<SendOutcome, DistributionError> {
        if request.branches.is_empty() {
            return Err(DistributionError::NoBranches);
        }

        let mut batch = SendBatch {
            id: SendId::new(Uuid::new_v4().to_string()),
            template_name: request.template_name.clone(),
            template_id: request.template_id.clone(),
            product_count: request.posters.len(),
            created_by: request.created_by.clone(),
            created_at: Utc::now(),
            status: SendStatus::Pending,
            error: None,
        };
        self.repository.create_send(batch.clone()).await?;
        log::info!(
            "Send {} created: {} poster(s) to {} branch(es)",
            batch.id,
            request.posters.len(),
            request.branches.len()
        );

        let result = match self.run(&batch.id, &request).await {
            Ok(delivered) => self
                .repository
                .set_status(&batch.id, SendStatus::Sent, None)
                .await
                .map(|()| delivered)
                .map_err(DistributionError::from),
            Err(err) => Err(err),
        };

        match result {
            Ok((items, document)) => {
                batch.status = SendStatus::Sent;
                log::info!("Send {} delivered to {} branch(es)", batch.id, items.len());
                Ok(SendOutcome {
                    batch,
                    items,
                    chunked: document.chunked,
                    chunk_count: document.chunk_count,
                })
            }
            Err(err) => {
                log::error!("Send {} failed: {}", batch.id, err);
                if let Err(e) = self
                    .repository
                    .set_status(&batch.id, SendStatus::Failed, Some(err.to_string()))
                    .await
                {
                    log::error!("Could not record failure of send {}: {}", batch.id, e);
                }
                Err(err)
            }
        }
    }

    async fn run(&self, send_id: &SendId, request: &SendRequest) -> Result<(Vec<SendItem>, FinalDocument), DistributionError> {
        let posters = validate_batch(&request.posters).map_err(PipelineError::from)?;

        let document = if posters.len() > self.config.chunk_size {
            self.generate_chunked(send_id, posters).await?
        } else {
            let pdf = self.generate(posters).await?;
            FinalDocument {
                bytes: pdf.bytes,
                filename: pdf.filename,
                chunked: false,
                chunk_count: 1,
            }
        };

        let items = self.distribute(send_id, &document, &request.branches).await?;
        Ok((items, document))
    }

    /// Generation is CPU-bound, so it runs on the blocking pool.
    async fn generate(&self, posters: Vec<Poster>) -> Result<GeneratedPdf, DistributionError> {
        let pipeline = self.pipeline.clone();
        let pdf = tokio::task::spawn_blocking(move || pipeline.generate_validated(&posters))
            .await
            .map_err(|e| DistributionError::Join(e.to_string()))??;
        Ok(pdf)
    }

    /// Intermediates are removed whether or not the merge succeeded.
    async fn generate_chunked(&self, send_id: &SendId, posters: Vec<Poster>) -> Result<FinalDocument, DistributionError> {
        let chunks = plan_chunks(posters.len(), self.config.chunk_size);
        log::info!("Send {}: {} poster(s) in {} chunk(s)", send_id, posters.len(), chunks.len());

        let mut temp_paths = Vec::with_capacity(chunks.len() + 1);
        let merged = self.merge_chunks(send_id, &posters, &chunks, &mut temp_paths).await;

        if self.config.cleanup_temp
            && !temp_paths.is_empty()
            && let Err(e) = self.storage.remove(&temp_paths).await
        {
            log::warn!("Send {}: failed to remove temporary files: {}", send_id, e);
        }

        Ok(FinalDocument {
            bytes: merged?,
            filename: poster_filename(Utc::now()),
            chunked: true,
            chunk_count: chunks.len(),
        })
    }

    /// Uploads each chunk and merges them, recording every path written to `temp_paths`.
    async fn merge_chunks(
        &self,
        send_id: &SendId,
        posters: &[Poster],
        chunks: &[Range<usize>],
        temp_paths: &mut Vec<String>,
    ) -> Result<Vec<u8>, DistributionError> {
        let prefix = &self.config.temp_prefix;
        let mut urls = Vec::with_capacity(chunks.len());
        for (n, range) in chunks.iter().enumerate() {
            let pdf = self.generate(posters[range.clone()].to_vec()).await?;
            let path = format!("{}/{}/chunk-{}.pdf", prefix, send_id, n);
            self.storage.upload(&path, pdf.bytes, PDF_CONTENT_TYPE).await?;
            temp_paths.push(path.clone());
            urls.push(self.storage.create_signed_url(&path, self.config.signed_url_ttl()).await?);
            log::debug!("Send {}: chunk {} ({} poster(s)) uploaded to {}", send_id, n, range.len(), path);
        }

        let final_path = format!("{}/{}/merged.pdf", prefix, send_id);
        let request = MergeRequest {
            pdf_urls: urls,
            final_path: final_path.clone(),
        };
        temp_paths.push(final_path.clone());
        self.merger.invoke(&request).await?;
        let bytes = self.storage.download(&final_path).await?;
        log::info!("Send {}: merged {} chunk(s) via {}", send_id, chunks.len(), self.merger.name());
        Ok(bytes)
    }

    async fn distribute(
        &self,
        send_id: &SendId,
        document: &FinalDocument,
        branches: &[Branch],
    ) -> Result<Vec<SendItem>, DistributionError> {
        let mut items = Vec::with_capacity(branches.len());
        for branch in branches {
            let path = format!("{}/{}.pdf", send_id, branch.id);
            self.storage.upload(&path, document.bytes.clone(), PDF_CONTENT_TYPE).await?;
            items.push(SendItem {
                id: Uuid::new_v4().to_string(),
                send_id: send_id.clone(),
                branch_id: branch.id.clone(),
                branch_name: branch.name.clone(),
                pdf_path: path,
                filename: document.filename.clone(),
                status: DeliveryStatus::Pending,
                downloaded_at: None,
            });
        }
        self.repository.add_items(items.clone()).await?;
        Ok(items)
    }

    /// Downloads a branch copy to `dest_dir` and records the delivery.
    pub async fn download_item(&self, item_id: &str, dest_dir: &Path) -> Result<PathBuf, DistributionError> {
        let item = self.repository.get_item(item_id).await?;
        let url = self
            .storage
            .create_signed_url(&item.pdf_path, self.config.signed_url_ttl())
            .await?;
        // Signed URLs differ per call; the object path identifies the download.
        let path = self
            .downloader
            .download_keyed(&item.pdf_path, &url, &item.filename, dest_dir)
            .await?;
        self.repository.mark_downloaded(item_id, Utc::now()).await?;
        Ok(path)
    }
}
