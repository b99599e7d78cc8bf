use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::{Document, KvStore, MemoryStore, StoreChange};
use crate::error::StoreError;

/// Memory store whose next `n` writes are rejected.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    failing_sets: AtomicUsize,
    pub sets_attempted: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_sets(&self, n: usize) {
        self.failing_sets.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError> {
        self.inner.get(keys).await
    }

    async fn get_all(&self) -> Result<Document, StoreError> {
        self.inner.get_all().await
    }

    async fn set(&self, items: Document) -> Result<(), StoreError> {
        self.sets_attempted.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_sets.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_sets.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.set(items).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.inner.remove(keys).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.subscribe()
    }
}
