//! Persistence seam for send records.

use async_trait::async_trait;
use cartel_types::{DeliveryStatus, SendBatch, SendId, SendItem, SendStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Repository backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SendRepository: Send + Sync + Debug {
    async fn create_send(&self, batch: SendBatch) -> Result<(), RepositoryError>;

    /// Updates the status of a send. `error` replaces any previous message.
    async fn set_status(&self, id: &SendId, status: SendStatus, error: Option<String>) -> Result<(), RepositoryError>;

    async fn add_items(&self, items: Vec<SendItem>) -> Result<(), RepositoryError>;

    async fn get_send(&self, id: &SendId) -> Result<SendBatch, RepositoryError>;

    /// Every send, newest first.
    async fn list_sends(&self) -> Result<Vec<SendBatch>, RepositoryError>;

    async fn items_for(&self, id: &SendId) -> Result<Vec<SendItem>, RepositoryError>;

    async fn get_item(&self, item_id: &str) -> Result<SendItem, RepositoryError>;

    /// Records a completed download and marks the item delivered.
    async fn mark_downloaded(&self, item_id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

/// Keeps sends and items in process memory.
#[derive(Debug, Default)]
pub struct InMemorySendRepository {
    sends: RwLock<HashMap<SendId, SendBatch>>,
    items: RwLock<Vec<SendItem>>,
}

impl InMemorySendRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Backend("lock poisoned".into())
}

#[async_trait]
impl SendRepository for InMemorySendRepository {
    async fn create_send(&self, batch: SendBatch) -> Result<(), RepositoryError> {
        let mut sends = self.sends.write().map_err(|_| poisoned())?;
        if sends.contains_key(&batch.id) {
            return Err(RepositoryError::Duplicate(batch.id.to_string()));
        }
        sends.insert(batch.id.clone(), batch);
        Ok(())
    }

    async fn set_status(&self, id: &SendId, status: SendStatus, error: Option<String>) -> Result<(), RepositoryError> {
        let mut sends = self.sends.write().map_err(|_| poisoned())?;
        let batch = sends.get_mut(id).ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        batch.status = status;
        batch.error = error;
        Ok(())
    }

    async fn add_items(&self, items: Vec<SendItem>) -> Result<(), RepositoryError> {
        self.items.write().map_err(|_| poisoned())?.extend(items);
        Ok(())
    }

    async fn get_send(&self, id: &SendId) -> Result<SendBatch, RepositoryError> {
        let sends = self.sends.read().map_err(|_| poisoned())?;
        sends.get(id).cloned().ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list_sends(&self) -> Result<Vec<SendBatch>, RepositoryError> {
        let mut sends: Vec<SendBatch> = self.sends.read().map_err(|_| poisoned())?.values().cloned().collect();
        sends.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sends)
    }

    async fn items_for(&self, id: &SendId) -> Result<Vec<SendItem>, RepositoryError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.iter().filter(|i| &i.send_id == id).cloned().collect())
    }

    async fn get_item(&self, item_id: &str) -> Result<SendItem, RepositoryError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(item_id.to_string()))
    }

    async fn mark_downloaded(&self, item_id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let item = items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| RepositoryError::NotFound(item_id.to_string()))?;
        item.downloaded_at = Some(at);
        item.status = DeliveryStatus::Delivered;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(id: &str) -> SendBatch {
        batch_at(id, Utc::now())
    }

    fn batch_at(id: &str, created_at: DateTime<Utc>) -> SendBatch {
        SendBatch {
            id: SendId::from(id),
            template_name: "Ofertas".into(),
            template_id: None,
            product_count: 1,
            created_by: "tester".into(),
            created_at,
            status: SendStatus::Pending,
            error: None,
        }
    }

    #[tokio::test]
    async fn status_updates_are_visible() {
        let repo = InMemorySendRepository::new();
        repo.create_send(batch("s1")).await.unwrap();
        repo.set_status(&SendId::from("s1"), SendStatus::Failed, Some("boom".into()))
            .await
            .unwrap();
        let stored = repo.get_send(&SendId::from("s1")).await.unwrap();
        assert_eq!(stored.status, SendStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn sends_are_listed_newest_first() {
        let repo = InMemorySendRepository::new();
        let now = Utc::now();
        repo.create_send(batch_at("old", now - chrono::Duration::minutes(5))).await.unwrap();
        repo.create_send(batch_at("new", now)).await.unwrap();
        let ids: Vec<String> = repo.list_sends().await.unwrap().iter().map(|b| b.id.to_string()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn duplicate_sends_are_rejected() {
        let repo = InMemorySendRepository::new();
        repo.create_send(batch("s1")).await.unwrap();
        assert!(matches!(repo.create_send(batch("s1")).await, Err(RepositoryError::Duplicate(_))));
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let repo = InMemorySendRepository::new();
        assert!(matches!(
            repo.mark_downloaded("missing", Utc::now()).await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
