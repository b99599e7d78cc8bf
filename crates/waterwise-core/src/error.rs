use crate::models::LimitPeriod;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize storage document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Write queue is closed")]
    Closed,
}

/// Rejections raised at the settings boundary. The messages are user-facing.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Please enter a value between 0.01 and 1.0")]
    RateOutOfRange(f64),

    #[error("The {period} limit must be a positive number of liters")]
    InvalidLimit { period: LimitPeriod, value: f64 },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
