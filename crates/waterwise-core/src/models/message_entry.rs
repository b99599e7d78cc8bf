use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Persisted water usage of one assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    /// Liters, replaced on every save.
    pub water_used: f64,
    /// First-seen time in unix milliseconds, never replaced.
    pub timestamp: i64,
}

/// Read-side view of a value found under `chatMessages[chat][message]`.
///
/// v1 stored a bare number per message; later versions store a
/// [`MessageEntry`] object. Anything else contributes nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoredEntry {
    Current {
        water_used: f64,
        timestamp: Option<i64>,
    },
    Legacy(f64),
    Malformed,
}

impl StoredEntry {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(StoredEntry::Legacy)
                .unwrap_or(StoredEntry::Malformed),
            Value::Object(map) => StoredEntry::Current {
                water_used: map
                    .get("waterUsed")
                    .and_then(Value::as_f64)
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0),
                timestamp: map.get("timestamp").and_then(|ts| {
                    ts.as_i64().or_else(|| ts.as_f64().map(|v| v as i64))
                }),
            },
            _ => StoredEntry::Malformed,
        }
    }

    pub fn water_used(&self) -> f64 {
        match self {
            StoredEntry::Current { water_used, .. } => *water_used,
            StoredEntry::Legacy(water_used) => *water_used,
            StoredEntry::Malformed => 0.0,
        }
    }

    pub fn timestamp(&self) -> Option<i64> {
        match self {
            StoredEntry::Current { timestamp, .. } => *timestamp,
            _ => None,
        }
    }
}
