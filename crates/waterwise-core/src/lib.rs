//! Water-usage tracking engine for AI chat pages.
//!
//! A page snapshot goes through the [`tracker::Tracker`], which estimates each
//! finished assistant message and persists it through the serial
//! [`write_queue::WriteQueue`]. The [`driver::ObservationDriver`] turns
//! mutation signals into debounced passes.

pub mod aggregator;
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod estimator;
pub mod format;
pub mod identity;
pub mod models;
pub mod page;
pub mod settings;
pub mod store;
pub mod streaming;
pub mod summary;
pub mod time;
pub mod tracing_setup;
pub mod tracker;
pub mod write_queue;

pub use config::CoreConfig;
pub use driver::{mutation_channel, DebounceTimer, DriverSummary, MutationNotifier, ObservationDriver};
pub use error::{QueueError, SettingsError, StoreError};
pub use models::{Conversation, LimitPeriod, MessageEntry, Preset, Settings, UsageLimits};
pub use page::{Element, Page, PageSource, SharedPage};
pub use store::{JsonFileStore, KvStore, MemoryStore, StoreChange};
pub use summary::UsageSummary;
pub use tracker::{PassReport, Tracker};
