pub mod conversation;
pub mod message_entry;
pub mod settings;

pub use conversation::{chat_id_from_url, Conversation};
pub use message_entry::{MessageEntry, StoredEntry};
pub use settings::{ml_per_100_words, validate_rate, LimitPeriod, Preset, Settings, UsageLimits};
