//! Serial queue for every read-modify-write against the store.
//!
//! The store only supports whole-value `get`/`set`, so two overlapping
//! cycles on `chatMessages` (or `chats`) would silently drop one update.
//! All such cycles go through one worker task that runs them strictly in
//! submission order; there is never more than one in flight.
//!
//! Each enqueue returns a [`Completion`] that resolves with that job's own
//! result. A failed job does not stop the worker, and a completion always
//! resolves: with [`QueueError::Closed`] if the worker is gone.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::aggregator;
use crate::constants::keys::CHAT_MESSAGES;
use crate::error::{QueueError, StoreError};
use crate::models::{MessageEntry, StoredEntry};
use crate::store::{object_or_empty, Document, KvStore};
use crate::time::now_ms;

enum Job {
    Save {
        chat_id: String,
        message_id: String,
        water_used: f64,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    Recompute {
        chat_id: String,
        source_url: String,
        reply: oneshot::Sender<Result<f64, StoreError>>,
    },
    Flush {
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
}

/// Resolves once the corresponding job has run.
#[must_use = "a completion does nothing unless awaited or dropped deliberately"]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, StoreError>>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result.map_err(QueueError::from),
            Err(_) => Err(QueueError::Closed),
        })
    }
}

/// Handle to the queue. Clones share the same worker.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl WriteQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn KvStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(store, rx));
        Self { tx }
    }

    /// Merge one message's usage into `chatMessages`.
    pub fn enqueue_save(&self, chat_id: &str, message_id: &str, water_used: f64) -> Completion<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Save {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            water_used,
            reply,
        });
        Completion { rx }
    }

    /// Rebuild the chat record and the global total, see [`aggregator::recompute`].
    pub fn enqueue_recompute(&self, chat_id: &str, source_url: &str) -> Completion<f64> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Recompute {
            chat_id: chat_id.to_string(),
            source_url: source_url.to_string(),
            reply,
        });
        Completion { rx }
    }

    /// Resolves after every job submitted before it has finished.
    pub fn flush(&self) -> Completion<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Flush { reply });
        Completion { rx }
    }

    fn submit(&self, job: Job) {
        // On a closed worker the job (and its reply sender) is dropped,
        // which resolves the completion with `Closed`.
        if self.tx.send(job).is_err() {
            warn!("Write queue worker has stopped; dropping job");
        }
    }
}

async fn run_worker(store: Arc<dyn KvStore>, mut rx: mpsc::UnboundedReceiver<Job>) {
    trace!("Write queue worker started");
    while let Some(job) = rx.recv().await {
        match job {
            Job::Save {
                chat_id,
                message_id,
                water_used,
                reply,
            } => {
                let result =
                    save_message(store.as_ref(), &chat_id, &message_id, water_used, now_ms()).await;
                if let Err(ref e) = result {
                    warn!("Saving {}/{} failed: {}", chat_id, message_id, e);
                }
                let _ = reply.send(result.map(|_| ()));
            }
            Job::Recompute {
                chat_id,
                source_url,
                reply,
            } => {
                let result =
                    aggregator::recompute(store.as_ref(), &chat_id, &source_url, now_ms()).await;
                if let Err(ref e) = result {
                    warn!("Recomputing {} failed: {}", chat_id, e);
                }
                let _ = reply.send(result);
            }
            Job::Flush { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }
    trace!("Write queue worker stopped");
}

/// One save cycle: read `chatMessages`, merge the entry, write it back.
///
/// The first-seen `timestamp` of an existing entry is kept; only
/// `waterUsed` is replaced. Returns whether anything was written.
pub(crate) async fn save_message(
    store: &dyn KvStore,
    chat_id: &str,
    message_id: &str,
    water_used: f64,
    now_ms: i64,
) -> Result<bool, StoreError> {
    let doc = store.get(&[CHAT_MESSAGES]).await?;
    let mut chat_messages = object_or_empty(&doc, CHAT_MESSAGES);

    let mut messages = match chat_messages.remove(chat_id) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let existing = messages.get(message_id).map(StoredEntry::from_value);
    let entry = MessageEntry {
        water_used,
        timestamp: existing.and_then(|e| e.timestamp()).unwrap_or(now_ms),
    };
    let new_value = serde_json::to_value(entry)?;

    if messages.get(message_id) == Some(&new_value) {
        trace!("Message {} unchanged at {:.4}L", message_id, water_used);
        return Ok(false);
    }
    messages.insert(message_id.to_string(), new_value);
    let message_count = messages.len();
    chat_messages.insert(chat_id.to_string(), Value::Object(messages));

    let mut items = Document::new();
    items.insert(CHAT_MESSAGES.to_string(), Value::Object(chat_messages));
    store.set(items).await?;

    debug!(
        "Saved message {} = {:.4}L, chat {} now has {} messages",
        message_id, water_used, chat_id, message_count
    );
    Ok(true)
}
