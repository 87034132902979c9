//! In-memory feed table for dry runs

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;
use summary_notifier_domain::{FeedItem, FeedItemStore, ItemKey, PutOutcome, StoreError};

/// In-memory source feed table
#[derive(Default)]
pub struct InMemoryFeedStore {
    items: RwLock<BTreeMap<ItemKey, FeedItem>>,
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows, ordered by key
    pub fn items(&self) -> Result<Vec<FeedItem>, StoreError> {
        let items = self
            .items
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(items.values().cloned().collect())
    }
}

#[async_trait]
impl FeedItemStore for InMemoryFeedStore {
    async fn put_if_absent(&self, item: &FeedItem) -> Result<PutOutcome, StoreError> {
        let mut items = self
            .items
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let key = item.key();
        if items.contains_key(&key) {
            return Ok(PutOutcome::Duplicate);
        }
        items.insert(key, item.clone());
        Ok(PutOutcome::Inserted)
    }
}
