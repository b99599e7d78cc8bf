use std::path::PathBuf;
use std::str::FromStr;

/// A limit given on the command line: liters, or `none` to remove it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitValue(pub Option<f64>);

impl FromStr for LimitValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self(None));
        }
        s.parse::<f64>()
            .map(|liters| Self(Some(liters)))
            .map_err(|_| format!("expected liters or \"none\", got {:?}", s))
    }
}

/// CLI command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Replay page snapshots through the observation driver
    Scan {
        snapshots: Vec<PathBuf>,
        interval_ms: Option<u64>,
    },
    /// Dashboard summary
    Stats,
    Settings(SettingsCommand),
    /// Remove all stored data
    Clear,
    /// Remove keys left behind by older versions
    Cleanup,
}

#[derive(Debug, Clone)]
pub enum SettingsCommand {
    Show,
    Set {
        ml_per_word: Option<f64>,
        show_float_button: Option<bool>,
        weekly: Option<LimitValue>,
        monthly: Option<LimitValue>,
        yearly: Option<LimitValue>,
    },
    Reset,
    Preset { name: String },
}
