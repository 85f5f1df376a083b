//! Persisted distribution records.

use crate::ids::{BranchId, SendId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

/// A destination store branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
}

impl Branch {
    pub fn new(id: impl Into<BranchId>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// One poster-generation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBatch {
    pub id: SendId,
    pub template_name: String,
    pub template_id: Option<String>,
    pub product_count: usize,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: SendStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-branch delivery of the batch document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendItem {
    pub id: String,
    pub send_id: SendId,
    pub branch_id: BranchId,
    pub branch_name: String,
    pub pdf_path: String,
    pub filename: String,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub downloaded_at: Option<DateTime<Utc>>,
}
