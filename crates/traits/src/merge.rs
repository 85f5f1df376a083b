//! Remote merge seam.
//!
//! The chunked send path uploads one PDF per chunk and asks a merge function
//! to produce a single document at `final_path` in the same bucket. The client
//! only observes success or failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub pdf_urls: Vec<String>,
    pub final_path: String,
}

#[derive(Error, Debug, Clone)]
pub enum MergeError {
    #[error("Merge request rejected: {0}")]
    Rejected(String),

    #[error("Merge failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait MergeFunction: Send + Sync + Debug {
    async fn invoke(&self, request: &MergeRequest) -> Result<(), MergeError>;

    fn name(&self) -> &'static str;
}
