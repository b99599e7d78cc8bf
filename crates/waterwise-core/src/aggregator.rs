use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::constants::keys::{CHATS, CHAT_MESSAGES, TOTAL_WATER};
use crate::error::StoreError;
use crate::models::{Conversation, StoredEntry};
use crate::store::{object_or_empty, Document, KvStore};

/// Sum of the usable `waterUsed` values in one chat's message map.
pub fn sum_entries(messages: &Map<String, Value>) -> f64 {
    messages
        .values()
        .map(|entry| StoredEntry::from_value(entry).water_used())
        .sum()
}

/// Sum of `waterUsed` over every stored conversation. Unreadable records count as zero.
pub fn sum_conversations(chats: &Map<String, Value>) -> f64 {
    chats
        .iter()
        .filter_map(|(key, value)| Conversation::from_value(key, value))
        .map(|conversation| conversation.water_used)
        .sum()
}

/// Rebuild `chats[chat_id]` and `totalWater` from the stored message entries.
///
/// Returns the chat's total. Both keys are written with a single `set`, and
/// only when something actually changed, so repeating a recompute over
/// unchanged entries is a no-op. A chat with no entries and no record yet is
/// not created.
///
/// Not safe to run concurrently with other writers of `chats`; go through
/// the write queue.
pub async fn recompute(
    store: &dyn KvStore,
    chat_id: &str,
    source_url: &str,
    now_ms: i64,
) -> Result<f64, StoreError> {
    let doc = store.get(&[CHAT_MESSAGES, CHATS, TOTAL_WATER]).await?;

    let messages = match object_or_empty(&doc, CHAT_MESSAGES).remove(chat_id) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let chat_total = sum_entries(&messages);
    let message_count = messages.len() as u64;

    let mut chats = object_or_empty(&doc, CHATS);
    let existing = chats
        .get(chat_id)
        .and_then(|value| Conversation::from_value(chat_id, value));

    let updated = match existing {
        None if message_count == 0 => None,
        None => Some(Conversation::new(chat_id, source_url, now_ms)),
        Some(c) if c.water_used == chat_total && c.message_count == message_count => None,
        Some(c) => Some(c),
    }
    .map(|mut conversation| {
        conversation.water_used = chat_total;
        conversation.message_count = message_count;
        conversation.last_updated = now_ms;
        conversation.source_url = source_url.to_string();
        conversation
    });

    let conversation_changed = updated.is_some();
    if let Some(conversation) = updated {
        chats.insert(chat_id.to_string(), serde_json::to_value(&conversation)?);
    }

    let total_water = sum_conversations(&chats);
    let stored_total = doc.get(TOTAL_WATER).and_then(Value::as_f64);

    trace!(
        "Recompute {}: {} messages, {:.4}L (all chats {:.4}L)",
        chat_id,
        message_count,
        chat_total,
        total_water
    );

    if !conversation_changed && stored_total == Some(total_water) {
        return Ok(chat_total);
    }

    let mut items = Document::new();
    items.insert(CHATS.to_string(), Value::Object(chats));
    items.insert(TOTAL_WATER.to_string(), Value::from(total_water));
    store.set(items).await?;

    debug!(
        "Chat {} now {:.4}L over {} messages, total {:.4}L",
        chat_id, chat_total, message_count, total_water
    );
    Ok(chat_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn store_with(doc: Value) -> MemoryStore {
        let store = MemoryStore::new();
        store.set(doc.as_object().cloned().unwrap()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_recompute_creates_conversation() {
        let store = store_with(json!({
            "chatMessages": {
                "abc": {
                    "m1": {"waterUsed": 0.0015, "timestamp": 1},
                    "m2": {"waterUsed": 0.0, "timestamp": 2},
                    "m3": {"waterUsed": 0.03, "timestamp": 3}
                }
            }
        }))
        .await;

        let total = recompute(&store, "abc", "https://chatgpt.com/c/abc", 99).await.unwrap();
        assert!((total - 0.0315).abs() < 1e-12);

        let doc = store.get_all().await.unwrap();
        let chat = &doc["chats"]["abc"];
        assert_eq!(chat["messageCount"], json!(3));
        assert_eq!(chat["lastUpdated"], json!(99));
        assert_eq!(chat["sourceUrl"], json!("https://chatgpt.com/c/abc"));
        assert_eq!(chat["waterUsed"].as_f64().unwrap(), total);
        assert_eq!(doc["totalWater"].as_f64().unwrap(), total);
    }

    #[tokio::test]
    async fn test_legacy_bare_numbers_and_garbage() {
        let store = store_with(json!({
            "chatMessages": {
                "abc": {"m1": 0.25, "m2": {"waterUsed": 0.5, "timestamp": 1}, "m3": "junk"}
            }
        }))
        .await;

        let total = recompute(&store, "abc", "u", 1).await.unwrap();
        assert_eq!(total, 0.75);
        let doc = store.get_all().await.unwrap();
        assert_eq!(doc["chats"]["abc"]["messageCount"], json!(3));
    }

    #[tokio::test]
    async fn test_global_total_spans_all_chats() {
        let store = store_with(json!({
            "chatMessages": {"b": {"m": {"waterUsed": 1.0, "timestamp": 1}}},
            "chats": {
                "a": {"id": "a", "waterUsed": 2.0, "messageCount": 4, "lastUpdated": 1, "url": "x"},
                "broken": 17
            },
            "totalWater": 123.0
        }))
        .await;

        recompute(&store, "b", "y", 5).await.unwrap();
        let doc = store.get_all().await.unwrap();
        assert_eq!(doc["totalWater"].as_f64().unwrap(), 3.0);
        // Other records are left as they were
        assert_eq!(doc["chats"]["broken"], json!(17));
        assert_eq!(doc["chats"]["a"]["url"], json!("x"));
    }

    #[tokio::test]
    async fn test_repeat_recompute_writes_nothing() {
        let store = store_with(json!({
            "chatMessages": {"abc": {"m1": {"waterUsed": 0.01, "timestamp": 1}}}
        }))
        .await;
        recompute(&store, "abc", "u", 10).await.unwrap();
        let before = store.get_all().await.unwrap();

        let mut rx = store.subscribe();
        recompute(&store, "abc", "u2", 20).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(store.get_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_empty_chat_is_not_created() {
        let store = MemoryStore::new();
        let total = recompute(&store, "default", "u", 1).await.unwrap();
        assert_eq!(total, 0.0);

        let doc = store.get_all().await.unwrap();
        assert!(doc.get("chats").map_or(true, |c| c.as_object().unwrap().is_empty()));
        assert_eq!(doc["totalWater"], json!(0.0));
    }

    #[tokio::test]
    async fn test_stale_total_is_reconciled() {
        let store = store_with(json!({
            "chats": {"a": {"id": "a", "waterUsed": 2.0, "messageCount": 1, "lastUpdated": 1, "sourceUrl": "x"}},
            "totalWater": 0.5
        }))
        .await;
        recompute(&store, "other", "u", 1).await.unwrap();
        let doc = store.get_all().await.unwrap();
        assert_eq!(doc["totalWater"].as_f64().unwrap(), 2.0);
    }
}
