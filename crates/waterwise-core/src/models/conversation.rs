use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::constants::{CHAT_PATH_MARKER, DEFAULT_CHAT_ID};

/// One tracked chat session as stored under the `chats` key.
///
/// Only the aggregator writes these records. Fields are read leniently so a
/// record written by an older version never breaks a recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub water_used: f64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub message_count: u64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub last_updated: i64,
    /// v2 records stored this as `url`.
    #[serde(default, alias = "url")]
    pub source_url: String,
}

impl Conversation {
    pub fn new(id: &str, source_url: &str, now_ms: i64) -> Self {
        Self {
            id: id.to_string(),
            water_used: 0.0,
            message_count: 0,
            last_updated: now_ms,
            source_url: source_url.to_string(),
        }
    }

    /// Parse a stored record. Returns `None` for anything that is not an object.
    pub fn from_value(key: &str, value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let mut conversation: Conversation = serde_json::from_value(value.clone()).ok()?;
        if conversation.id.is_empty() {
            conversation.id = key.to_string();
        }
        Some(conversation)
    }

    /// Short label used in dashboard listings.
    pub fn short_title(&self) -> String {
        let prefix: String = self.id.chars().take(8).collect();
        format!("Chat {}...", prefix)
    }
}

/// Extract the conversation id from a chat page URL.
///
/// The id is the path segment following `/c/`. Pages without one (the
/// landing page, a fresh chat) map to [`DEFAULT_CHAT_ID`].
pub fn chat_id_from_url(url: &str) -> String {
    let without_scheme = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };
    let path = match without_scheme.find('/') {
        Some(pos) if url.contains("://") => &without_scheme[pos..],
        Some(_) => without_scheme,
        None => "",
    };
    let path = path.split(['?', '#']).next().unwrap_or("");

    path.find(CHAT_PATH_MARKER)
        .map(|pos| &path[pos + CHAT_PATH_MARKER.len()..])
        .and_then(|rest| rest.split('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_CHAT_ID.to_string())
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0))
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
        .unwrap_or(0))
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().map(|v| v as i64))
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_id_from_full_url() {
        assert_eq!(chat_id_from_url("https://chatgpt.com/c/abc-123"), "abc-123");
        assert_eq!(chat_id_from_url("https://chatgpt.com/c/abc-123/extra?x=1"), "abc-123");
        assert_eq!(chat_id_from_url("https://chatgpt.com/g/g-xyz/c/def#top"), "def");
    }

    #[test]
    fn test_chat_id_from_path_only() {
        assert_eq!(chat_id_from_url("/c/xyz"), "xyz");
    }

    #[test]
    fn test_chat_id_defaults_without_marker() {
        assert_eq!(chat_id_from_url("https://chatgpt.com/"), DEFAULT_CHAT_ID);
        assert_eq!(chat_id_from_url("https://chatgpt.com/c/"), DEFAULT_CHAT_ID);
        assert_eq!(chat_id_from_url(""), DEFAULT_CHAT_ID);
        // The marker in the host or query must not count
        assert_eq!(chat_id_from_url("https://x.com/?next=/c/abc"), DEFAULT_CHAT_ID);
    }

    #[test]
    fn test_conversation_reads_legacy_url_field() {
        let value = json!({
            "id": "abc",
            "waterUsed": 0.5,
            "messageCount": 3,
            "lastUpdated": 1700000000000i64,
            "url": "https://chatgpt.com/c/abc"
        });
        let conversation = Conversation::from_value("abc", &value).unwrap();
        assert_eq!(conversation.source_url, "https://chatgpt.com/c/abc");
        assert_eq!(conversation.message_count, 3);
    }

    #[test]
    fn test_conversation_tolerates_bad_fields() {
        let value = json!({ "waterUsed": "lots", "messageCount": null });
        let conversation = Conversation::from_value("k", &value).unwrap();
        assert_eq!(conversation.id, "k");
        assert_eq!(conversation.water_used, 0.0);
        assert_eq!(conversation.message_count, 0);

        assert!(Conversation::from_value("k", &json!(4.2)).is_none());
    }

    #[test]
    fn test_conversation_serializes_camel_case() {
        let conversation = Conversation::new("abc", "https://chatgpt.com/c/abc", 42);
        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(value["sourceUrl"], "https://chatgpt.com/c/abc");
        assert_eq!(value["lastUpdated"], 42);
        assert_eq!(value["messageCount"], 0);
    }
}
