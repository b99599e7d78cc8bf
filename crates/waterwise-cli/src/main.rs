use std::path::PathBuf;

use clap::{Parser, Subcommand};
use waterwise_cli::cli::{run_command, CliCommand, CliConfig, LimitValue, SettingsCommand};
use waterwise_core::tracing_setup::init_tracing;

#[derive(Parser)]
#[command(name = "waterwise")]
#[command(about = "Estimate the water used by AI chat responses")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (contains dataDir, debounceMs)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Directory holding the store, overrides the config file
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay page snapshots, one mutation per file
    Scan {
        /// Page snapshot JSON files, in order
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,
        /// Delay between snapshots (default: twice the debounce)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Show usage totals, top chats and limit status
    Stats,

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Delete all tracked data and settings
    Clear,

    /// Remove data left behind by older versions
    Cleanup,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        /// Milliliters per word, between 0.01 and 1.0
        #[arg(long)]
        ml_per_word: Option<f64>,
        #[arg(long)]
        show_float_button: Option<bool>,
        /// Weekly limit in liters, or "none"
        #[arg(long)]
        weekly: Option<LimitValue>,
        /// Monthly limit in liters, or "none"
        #[arg(long)]
        monthly: Option<LimitValue>,
        /// Yearly limit in liters, or "none"
        #[arg(long)]
        yearly: Option<LimitValue>,
    },
    /// Restore the default rate and float button
    Reset,
    /// Apply a named rate: conservative, balanced or optimistic
    Preset { name: String },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli);
    let core_config = config.core_config(cli.data_dir.as_deref());

    let command = match cli.command {
        Some(Commands::Scan {
            snapshots,
            interval_ms,
        }) => CliCommand::Scan {
            snapshots,
            interval_ms,
        },
        Some(Commands::Stats) => CliCommand::Stats,
        Some(Commands::Settings { action }) => CliCommand::Settings(match action {
            None | Some(SettingsAction::Show) => SettingsCommand::Show,
            Some(SettingsAction::Set {
                ml_per_word,
                show_float_button,
                weekly,
                monthly,
                yearly,
            }) => SettingsCommand::Set {
                ml_per_word,
                show_float_button,
                weekly,
                monthly,
                yearly,
            },
            Some(SettingsAction::Reset) => SettingsCommand::Reset,
            Some(SettingsAction::Preset { name }) => SettingsCommand::Preset { name },
        }),
        Some(Commands::Clear) => CliCommand::Clear,
        Some(Commands::Cleanup) => CliCommand::Cleanup,
        None => {
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(command, cli.pretty, &core_config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `--config`, else the default location if present
fn load_config(cli: &Cli) -> CliConfig {
    if let Some(ref path) = cli.config {
        match CliConfig::load(path) {
            Ok(config) => return config,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    match CliConfig::default_path() {
        Some(path) if path.exists() => CliConfig::load(&path).unwrap_or_else(|e| {
            eprintln!("Warning: ignoring {}: {:#}", path.display(), e);
            CliConfig::default()
        }),
        _ => CliConfig::default(),
    }
}
