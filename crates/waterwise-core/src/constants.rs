//! Application-wide constants
//!
//! Centralized location for store keys, page markers and default
//! values shared across the engine.

/// Default rate in milliliters per generated word.
pub const DEFAULT_ML_PER_WORD: f64 = 0.15;

/// Accepted bounds for the configured rate.
pub const MIN_ML_PER_WORD: f64 = 0.01;
pub const MAX_ML_PER_WORD: f64 = 1.0;

/// Quiet period after the last mutation before a processing pass runs.
pub const DEBOUNCE_MS: u64 = 500;

/// Delay before a failed save is retried once.
pub const SAVE_RETRY_BACKOFF_MS: u64 = 250;

/// Conversation id used when the page URL carries none.
pub const DEFAULT_CHAT_ID: &str = "default";

/// Path marker preceding the conversation id in chat URLs.
pub const CHAT_PATH_MARKER: &str = "/c/";

/// Number of conversations shown in the dashboard chart.
pub const TOP_CHATS: usize = 5;

// Durable store keys
pub mod keys {
    pub const ML_PER_WORD: &str = "mlPerWord";
    pub const SHOW_FLOAT_BUTTON: &str = "showFloatButton";
    pub const USAGE_LIMITS: &str = "usageLimits";
    pub const CHAT_MESSAGES: &str = "chatMessages";
    pub const CHATS: &str = "chats";
    pub const TOTAL_WATER: &str = "totalWater";
    /// Written by v1.x, removed on cleanup.
    pub const LEGACY_PROCESSED_MESSAGES: &str = "processedMessages";
}

// Attributes and classes the chat page renders messages with
pub mod markup {
    pub const MESSAGE_ID_ATTR: &str = "data-message-id";
    pub const AUTHOR_ROLE_ATTR: &str = "data-message-author-role";
    pub const ROLE_ASSISTANT: &str = "assistant";
    pub const ROLE_USER: &str = "user";
    pub const TEST_ID_ATTR: &str = "data-testid";
    pub const STOP_BUTTON_TEST_ID: &str = "stop-button";
    pub const STREAMING_CLASS: &str = "result-streaming";
    pub const STREAMING_CLASS_FRAGMENT: &str = "streaming";
    pub const MARKDOWN_CLASS_FRAGMENT: &str = "markdown";
}
