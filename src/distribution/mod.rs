//! Sending a poster batch to store branches.

mod merge;
mod orchestrator;
pub mod repository;

pub use merge::{ComposerMergeFunction, PDF_CONTENT_TYPE};
pub use orchestrator::{SendOrchestrator, SendOutcome, SendRequest, plan_chunks};
pub use repository::{InMemorySendRepository, RepositoryError, SendRepository};

use crate::download::DownloadError;
use crate::error::PipelineError;
use cartel_traits::{MergeError, StorageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributionError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("A send needs at least one destination branch")]
    NoBranches,

    #[error("Generation task failed: {0}")]
    Join(String),
}
