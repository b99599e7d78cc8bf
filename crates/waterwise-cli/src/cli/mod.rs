pub mod commands;
pub mod config;
pub mod protocol;

pub use commands::{execute, run_command};
pub use config::CliConfig;
pub use protocol::{CliCommand, LimitValue, SettingsCommand};
