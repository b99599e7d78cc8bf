//! Durable key-value document the engine persists into.
//!
//! Every backend exposes the same narrow surface: whole-value `get`/`set` per
//! key plus key-level change notifications. Nothing here is transactional;
//! callers that read-modify-write must serialize themselves (see
//! [`crate::write_queue`]).

pub mod json_file;
pub mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

use crate::error::StoreError;

/// The whole stored document, keyed by top-level store key.
pub type Document = Map<String, Value>;

/// Buffered notifications per subscriber before lagging receivers drop some.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Keys changed by one store operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreChange {
    pub changes: BTreeMap<String, ValueChange>,
}

impl StoreChange {
    pub fn touches(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ValueChange> {
        self.changes.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Values for the requested keys. Absent keys are omitted.
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError>;

    async fn get_all(&self) -> Result<Document, StoreError>;

    /// Replace the given keys with whole new values as one operation.
    async fn set(&self, items: Document) -> Result<(), StoreError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    /// Receive a [`StoreChange`] after every operation that changed something.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// In-memory document plus its change channel, shared by the backends.
pub(crate) struct DocumentCell {
    doc: RwLock<Document>,
    changes_tx: broadcast::Sender<StoreChange>,
}

impl DocumentCell {
    pub(crate) fn new(doc: Document) -> Self {
        let (changes_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            doc: RwLock::new(doc),
            changes_tx,
        }
    }

    pub(crate) fn get(&self, keys: &[&str]) -> Document {
        let doc = self.doc.read();
        keys.iter()
            .filter_map(|key| doc.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Document {
        self.doc.read().clone()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes_tx.subscribe()
    }

    /// Compute the document `op` would produce without committing it.
    pub(crate) fn preview(&self, op: &Operation) -> (Document, StoreChange) {
        let current = self.doc.read();
        op.apply(&current)
    }

    /// Install a previewed document and notify subscribers.
    pub(crate) fn commit(&self, next: Document, change: StoreChange) {
        *self.doc.write() = next;
        self.notify(change);
    }

    /// Preview and commit under one lock.
    pub(crate) fn apply(&self, op: &Operation) {
        let change = {
            let mut doc = self.doc.write();
            let (next, change) = op.apply(&doc);
            *doc = next;
            change
        };
        self.notify(change);
    }

    fn notify(&self, change: StoreChange) {
        if !change.is_empty() {
            // No receivers is fine
            let _ = self.changes_tx.send(change);
        }
    }
}

pub(crate) enum Operation {
    Set(Document),
    Remove(Vec<String>),
    Clear,
}

impl Operation {
    pub(crate) fn remove(keys: &[&str]) -> Self {
        Operation::Remove(keys.iter().map(|k| k.to_string()).collect())
    }

    fn apply(&self, current: &Document) -> (Document, StoreChange) {
        let mut next = current.clone();
        let mut change = StoreChange::default();
        match self {
            Operation::Set(items) => {
                for (key, value) in items {
                    let old_value = next.insert(key.clone(), value.clone());
                    if old_value.as_ref() != Some(value) {
                        change.changes.insert(
                            key.clone(),
                            ValueChange {
                                old_value,
                                new_value: Some(value.clone()),
                            },
                        );
                    }
                }
            }
            Operation::Remove(keys) => {
                for key in keys {
                    if let Some(old_value) = next.remove(key) {
                        change.changes.insert(
                            key.clone(),
                            ValueChange {
                                old_value: Some(old_value),
                                new_value: None,
                            },
                        );
                    }
                }
            }
            Operation::Clear => {
                for (key, old_value) in std::mem::take(&mut next) {
                    change.changes.insert(
                        key,
                        ValueChange {
                            old_value: Some(old_value),
                            new_value: None,
                        },
                    );
                }
            }
        }
        (next, change)
    }
}

/// Object stored under `key`, or an empty map when absent or not an object.
pub fn object_or_empty(doc: &Document, key: &str) -> Map<String, Value> {
    match doc.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}
