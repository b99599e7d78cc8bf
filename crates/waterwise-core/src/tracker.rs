//! One processing pass over the visible chat messages.
//!
//! Everything that inspects the page runs synchronously and produces owned
//! work items; only persistence suspends. Saves for different messages run
//! concurrently and rely on the write queue for ordering.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::constants::keys::{ML_PER_WORD, SHOW_FLOAT_BUTTON, USAGE_LIMITS};
use crate::constants::markup::{AUTHOR_ROLE_ATTR, MARKDOWN_CLASS_FRAGMENT, ROLE_ASSISTANT, ROLE_USER};
use crate::constants::SAVE_RETRY_BACKOFF_MS;
use crate::error::{QueueError, StoreError};
use crate::estimator::estimate;
use crate::identity::{IdentityResolver, PositionalIdentity};
use crate::models::Settings;
use crate::page::{Element, Located, Page, Selector};
use crate::settings::{load_settings, ml_per_word_from, show_float_button_from, usage_limits_from};
use crate::store::{KvStore, StoreChange};
use crate::streaming::is_streaming;
use crate::write_queue::WriteQueue;

/// Selectors tried in order when looking for assistant messages. Later
/// entries cover older markup.
pub fn candidate_selectors() -> [Selector; 3] {
    [
        Selector::attr(AUTHOR_ROLE_ATTR, ROLE_ASSISTANT),
        Selector::classes(&["group", "w-full", "text-token-text-primary"]),
        Selector::class_contains("agent-turn"),
    ]
}

/// Assistant message nodes on the page, from the first selector that finds any.
pub fn find_candidates(page: &Page) -> Vec<Located<'_>> {
    let user = Selector::attr(AUTHOR_ROLE_ATTR, ROLE_USER);
    for selector in candidate_selectors() {
        let found: Vec<_> = page
            .find_all(&selector)
            .into_iter()
            .filter(|located| !located.node.contains(&user))
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Text of the message body: the markdown container if rendered, else the
/// nested assistant node, else the node itself.
pub fn message_text(node: &Element) -> String {
    node.find_first(&Selector::class_contains(MARKDOWN_CLASS_FRAGMENT))
        .or_else(|| node.find_first(&Selector::attr(AUTHOR_ROLE_ATTR, ROLE_ASSISTANT)))
        .unwrap_or(node)
        .text_content()
}

/// Candidates under the same parent element as `located`, in document order.
fn siblings_of<'a>(candidates: &[Located<'a>], located: &Located<'a>) -> Vec<&'a Element> {
    candidates
        .iter()
        .filter(|other| match (other.parent, located.parent) {
            (Some(a), Some(b)) => std::ptr::eq(a, b),
            (None, None) => true,
            _ => false,
        })
        .map(|other| other.node)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
struct PendingSave {
    message_id: String,
    water_used: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Streaming,
    EmptyText,
    Unidentified,
}

/// Counts from one pass. Skips are normal outcomes, failures are not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub chat_id: String,
    pub candidates: usize,
    pub saved: usize,
    pub streaming: usize,
    pub empty: usize,
    pub unidentified: usize,
    pub failed: usize,
    /// Chat total after the last successful recompute of this pass.
    pub chat_total: Option<f64>,
}

pub struct Tracker {
    store: Arc<dyn KvStore>,
    queue: WriteQueue,
    resolver: Arc<dyn IdentityResolver>,
    settings: Arc<RwLock<Settings>>,
    retry_backoff: Duration,
}

impl Tracker {
    /// Must be called inside a tokio runtime; spawns the write queue worker.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let queue = WriteQueue::spawn(store.clone());
        Self {
            store,
            queue,
            resolver: Arc::new(PositionalIdentity),
            settings: Arc::new(RwLock::new(Settings::default())),
            retry_backoff: Duration::from_millis(SAVE_RETRY_BACKOFF_MS),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    pub fn settings(&self) -> Settings {
        *self.settings.read()
    }

    /// Refresh the cached settings from the store.
    pub async fn load_settings(&self) -> Result<Settings, StoreError> {
        let settings = load_settings(self.store.as_ref()).await?;
        *self.settings.write() = settings;
        debug!("Loaded settings: {} ml/word", settings.ml_per_word);
        Ok(settings)
    }

    /// Keep the cached settings in step with store changes until aborted.
    pub fn watch_settings(&self) -> JoinHandle<()> {
        let mut rx = self.store.subscribe();
        let settings = self.settings.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => apply_settings_change(&settings, &change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Settings watcher lagged, {} changes skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Recompute a chat's totals without observing any message.
    pub async fn reconcile(&self, chat_id: &str, source_url: &str) -> Result<f64, QueueError> {
        let total = self.queue.enqueue_recompute(chat_id, source_url).await?;
        info!("Reconciled chat {}: {:.4}L", chat_id, total);
        Ok(total)
    }

    /// Run the full pipeline over every candidate message on `page`.
    ///
    /// Never fails: per-message errors are logged and counted.
    pub async fn process_page(&self, page: &Page) -> PassReport {
        let chat_id = page.chat_id();
        let ml_per_word = self.settings.read().ml_per_word;
        let candidates = find_candidates(page);

        let mut report = PassReport {
            chat_id: chat_id.clone(),
            candidates: candidates.len(),
            ..Default::default()
        };

        let mut pending = Vec::with_capacity(candidates.len());
        for located in &candidates {
            let siblings = siblings_of(&candidates, located);
            match self.inspect(page, located.node, &siblings, ml_per_word) {
                Ok(save) => pending.push(save),
                Err(Skip::Streaming) => report.streaming += 1,
                Err(Skip::EmptyText) => report.empty += 1,
                Err(Skip::Unidentified) => report.unidentified += 1,
            }
        }

        let results = join_all(
            pending
                .into_iter()
                .map(|save| self.persist(&chat_id, &page.url, save)),
        )
        .await;

        for result in results {
            match result {
                Ok(total) => {
                    report.saved += 1;
                    report.chat_total = Some(total);
                }
                Err(_) => report.failed += 1,
            }
        }

        debug!(
            "Processed {} messages in chat {}: {} saved, {} streaming, {} failed",
            report.candidates, report.chat_id, report.saved, report.streaming, report.failed
        );
        report
    }

    fn inspect(
        &self,
        page: &Page,
        node: &Element,
        siblings: &[&Element],
        ml_per_word: f64,
    ) -> Result<PendingSave, Skip> {
        if is_streaming(page, node) {
            return Err(Skip::Streaming);
        }

        let text = message_text(node);
        if text.is_empty() {
            return Err(Skip::EmptyText);
        }

        let message_id = self
            .resolver
            .resolve(node, siblings)
            .ok_or(Skip::Unidentified)?;

        let water_used = estimate(&text, ml_per_word);
        trace!(
            "Message {}: {} chars, {:.4}L",
            message_id,
            text.len(),
            water_used
        );
        Ok(PendingSave {
            message_id,
            water_used,
        })
    }

    async fn persist(&self, chat_id: &str, source_url: &str, save: PendingSave) -> Result<f64, QueueError> {
        if let Err(e) = self.save_with_retry(chat_id, &save).await {
            warn!("Giving up on message {}: {}", save.message_id, e);
            return Err(e);
        }
        self.queue
            .enqueue_recompute(chat_id, source_url)
            .await
            .inspect_err(|e| warn!("Recompute after {} failed: {}", save.message_id, e))
    }

    async fn save_with_retry(&self, chat_id: &str, save: &PendingSave) -> Result<(), QueueError> {
        match self
            .queue
            .enqueue_save(chat_id, &save.message_id, save.water_used)
            .await
        {
            Err(QueueError::Store(e)) => {
                warn!("Save of {} failed ({}), retrying once", save.message_id, e);
                tokio::time::sleep(self.retry_backoff).await;
                self.queue
                    .enqueue_save(chat_id, &save.message_id, save.water_used)
                    .await
            }
            other => other,
        }
    }
}

fn apply_settings_change(settings: &RwLock<Settings>, change: &StoreChange) {
    let mut settings = settings.write();
    if let Some(c) = change.get(ML_PER_WORD) {
        settings.ml_per_word = ml_per_word_from(c.new_value.as_ref());
        debug!("Rate changed to {} ml/word", settings.ml_per_word);
    }
    if let Some(c) = change.get(SHOW_FLOAT_BUTTON) {
        settings.show_float_button = show_float_button_from(c.new_value.as_ref());
    }
    if let Some(c) = change.get(USAGE_LIMITS) {
        settings.usage_limits = usage_limits_from(c.new_value.as_ref());
    }
}
