//! Store backed by a single JSON document on disk.
//!
//! The document is loaded once and kept in memory. Every mutation writes the
//! full document to a temp file and renames it over the previous one, so a
//! crash mid-write never leaves a truncated store behind. The in-memory copy
//! only changes after the file write succeeded.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use super::{Document, DocumentCell, KvStore, Operation, StoreChange};
use crate::error::StoreError;

const STORE_FILE_NAME: &str = "storage.json";

pub struct JsonFileStore {
    path: PathBuf,
    cell: DocumentCell,
    /// Serializes file writes; readers never wait on it.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or create) `<data_dir>/storage.json`.
    pub async fn open(data_dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(data_dir).await?;
        let path = store_path(data_dir);

        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Document::new(),
            Ok(content) => serde_json::from_str::<Document>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No store at {}, starting empty", path.display());
                Document::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            cell: DocumentCell::new(doc),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate(&self, op: Operation) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let (next, change) = self.cell.preview(&op);
        if change.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.persist(&next).await {
            warn!("Failed to write store {}: {}", self.path.display(), e);
            return Err(e);
        }
        self.cell.commit(next, change);
        Ok(())
    }

    async fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let temp_file = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_file, &bytes).await?;
        tokio::fs::rename(&temp_file, &self.path).await?;
        Ok(())
    }
}

pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE_NAME)
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError> {
        Ok(self.cell.get(keys))
    }

    async fn get_all(&self) -> Result<Document, StoreError> {
        Ok(self.cell.snapshot())
    }

    async fn set(&self, items: Document) -> Result<(), StoreError> {
        self.mutate(Operation::Set(items)).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.mutate(Operation::remove(keys)).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.mutate(Operation::Clear).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.cell.subscribe()
    }
}
