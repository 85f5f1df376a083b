use async_trait::async_trait;
use cartel_pdf_composer::merge_pdf_bytes;
use cartel_traits::{MergeError, MergeFunction, MergeRequest, ObjectStorage};
use std::sync::Arc;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Merges chunk PDFs structurally and stores the result next to them.
///
/// Stands in for a remote merge service: it reads every signed URL from the
/// same bucket, appends the pages in request order and uploads the merged
/// document to `final_path`.
#[derive(Debug, Clone)]
pub struct ComposerMergeFunction {
    storage: Arc<dyn ObjectStorage>,
}

impl ComposerMergeFunction {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl MergeFunction for ComposerMergeFunction {
    async fn invoke(&self, request: &MergeRequest) -> Result<(), MergeError> {
        if request.pdf_urls.is_empty() {
            return Err(MergeError::Rejected("no documents to merge".into()));
        }
        let mut documents = Vec::with_capacity(request.pdf_urls.len());
        for url in &request.pdf_urls {
            let bytes = self
                .storage
                .download_signed(url)
                .await
                .map_err(|e| MergeError::Rejected(e.to_string()))?;
            documents.push(bytes);
        }

        let merged = tokio::task::spawn_blocking(move || merge_pdf_bytes(&documents))
            .await
            .map_err(|e| MergeError::Failed(format!("merge task panicked: {}", e)))?
            .map_err(|e| MergeError::Failed(e.to_string()))?;

        log::info!(
            "Merged {} document(s) into '{}' ({} bytes)",
            request.pdf_urls.len(),
            request.final_path,
            merged.len()
        );
        self.storage
            .upload(&request.final_path, merged, PDF_CONTENT_TYPE)
            .await
            .map_err(|e| MergeError::Failed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "composer-merge"
    }
}
