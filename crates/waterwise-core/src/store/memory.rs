use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{Document, DocumentCell, KvStore, Operation, StoreChange};
use crate::error::StoreError;

/// Process-local store. Used for embedding and in tests.
pub struct MemoryStore {
    cell: DocumentCell,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    pub fn with_document(doc: Document) -> Self {
        Self {
            cell: DocumentCell::new(doc),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError> {
        Ok(self.cell.get(keys))
    }

    async fn get_all(&self) -> Result<Document, StoreError> {
        Ok(self.cell.snapshot())
    }

    async fn set(&self, items: Document) -> Result<(), StoreError> {
        self.cell.apply(&Operation::Set(items));
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.cell.apply(&Operation::remove(keys));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.cell.apply(&Operation::Clear);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.cell.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_omits_missing_keys() {
        let store = MemoryStore::new();
        store
            .set(json!({"mlPerWord": 0.2}).as_object().cloned().unwrap())
            .await
            .unwrap();

        let got = store.get(&["mlPerWord", "chats"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["mlPerWord"], json!(0.2));
    }

    #[tokio::test]
    async fn test_remove_notifies_subscribers() {
        let store = MemoryStore::new();
        store
            .set(json!({"processedMessages": [1, 2]}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let mut rx = store.subscribe();

        store.remove(&["processedMessages", "nope"]).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert!(change.touches("processedMessages"));
        assert!(!change.touches("nope"));
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
