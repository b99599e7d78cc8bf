//! Dashboard view of everything tracked so far, plus the data maintenance
//! actions offered next to it.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::constants::keys::{CHATS, CHAT_MESSAGES, LEGACY_PROCESSED_MESSAGES, TOTAL_WATER};
use crate::constants::TOP_CHATS;
use crate::error::StoreError;
use crate::format::comparison_text;
use crate::models::{Conversation, LimitPeriod, Settings, StoredEntry};
use crate::settings::settings_from;
use crate::store::{object_or_empty, KvStore};
use crate::time::MS_PER_DAY;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub water_used: f64,
    pub message_count: u64,
    pub last_updated: i64,
    pub source_url: String,
}

impl From<Conversation> for ChatSummary {
    fn from(conversation: Conversation) -> Self {
        Self {
            title: conversation.short_title(),
            id: conversation.id,
            water_used: conversation.water_used,
            message_count: conversation.message_count,
            last_updated: conversation.last_updated,
            source_url: conversation.source_url,
        }
    }
}

/// Usage against one configured ceiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStatus {
    pub period: LimitPeriod,
    pub limit: f64,
    pub used: f64,
    /// `used / limit`, may exceed 1.
    pub fraction: f64,
    pub exceeded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total_water: f64,
    pub chat_count: usize,
    pub message_count: u64,
    pub comparison: String,
    /// Highest usage first, at most five.
    pub top_chats: Vec<ChatSummary>,
    /// Every chat, most recently updated first.
    pub recent_chats: Vec<ChatSummary>,
    /// Only periods with a limit set.
    pub limits: Vec<LimitStatus>,
    pub settings: Settings,
}

impl UsageSummary {
    pub async fn load(store: &dyn KvStore, now_ms: i64) -> Result<Self, StoreError> {
        let doc = store.get_all().await?;
        let settings = settings_from(&doc);

        let conversations: Vec<Conversation> = object_or_empty(&doc, CHATS)
            .iter()
            .filter_map(|(key, value)| Conversation::from_value(key, value))
            .collect();

        let summed: f64 = conversations.iter().map(|c| c.water_used).sum();
        let total_water = doc
            .get(TOTAL_WATER)
            .and_then(Value::as_f64)
            .unwrap_or(summed);
        let message_count = conversations.iter().map(|c| c.message_count).sum();

        let mut top: Vec<ChatSummary> = conversations.into_iter().map(ChatSummary::from).collect();
        let mut recent = top.clone();
        top.sort_by(|a, b| b.water_used.total_cmp(&a.water_used));
        top.truncate(TOP_CHATS);
        recent.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));

        let chat_messages = object_or_empty(&doc, CHAT_MESSAGES);
        let limits = LimitPeriod::ALL
            .iter()
            .filter_map(|&period| {
                let limit = settings.usage_limits.get(period)?;
                let since = now_ms - period.window_days() * MS_PER_DAY;
                let used = usage_since(&chat_messages, since);
                Some(LimitStatus {
                    period,
                    limit,
                    used,
                    fraction: used / limit,
                    exceeded: used > limit,
                })
            })
            .collect();

        Ok(Self {
            total_water,
            chat_count: recent.len(),
            message_count,
            comparison: comparison_text(total_water),
            top_chats: top,
            recent_chats: recent,
            limits,
            settings,
        })
    }
}

/// Water from entries first seen at or after `since_ms`. Legacy entries
/// carry no timestamp and are left out.
pub fn usage_since(chat_messages: &Map<String, Value>, since_ms: i64) -> f64 {
    chat_messages
        .values()
        .filter_map(Value::as_object)
        .flat_map(|messages| messages.values())
        .map(StoredEntry::from_value)
        .filter(|entry| entry.timestamp().is_some_and(|ts| ts >= since_ms))
        .map(|entry| entry.water_used())
        .sum()
}

/// Drop keys only older versions wrote. Returns whether any were present.
pub async fn cleanup_legacy_data(store: &dyn KvStore) -> Result<bool, StoreError> {
    let found = !store.get(&[LEGACY_PROCESSED_MESSAGES]).await?.is_empty();
    if found {
        store.remove(&[LEGACY_PROCESSED_MESSAGES]).await?;
        info!("Removed legacy {} data", LEGACY_PROCESSED_MESSAGES);
    }
    Ok(found)
}

/// Remove every tracked value and setting.
pub async fn clear_all_data(store: &dyn KvStore) -> Result<(), StoreError> {
    store.clear().await?;
    info!("All stored data cleared");
    Ok(())
}
