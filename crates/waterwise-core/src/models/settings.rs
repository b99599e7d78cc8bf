use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_ML_PER_WORD, MAX_ML_PER_WORD, MIN_ML_PER_WORD};
use crate::error::SettingsError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl LimitPeriod {
    pub const ALL: [LimitPeriod; 3] = [Self::Weekly, Self::Monthly, Self::Yearly];

    /// Length of the rolling window the limit is measured over.
    pub fn window_days(&self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Yearly => 365,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for LimitPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Optional usage ceilings in liters. `None` means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageLimits {
    #[serde(default)]
    pub weekly: Option<f64>,
    #[serde(default)]
    pub monthly: Option<f64>,
    #[serde(default)]
    pub yearly: Option<f64>,
}

impl UsageLimits {
    pub fn get(&self, period: LimitPeriod) -> Option<f64> {
        match period {
            LimitPeriod::Weekly => self.weekly,
            LimitPeriod::Monthly => self.monthly,
            LimitPeriod::Yearly => self.yearly,
        }
    }

    pub fn set(&mut self, period: LimitPeriod, value: Option<f64>) {
        match period {
            LimitPeriod::Weekly => self.weekly = value,
            LimitPeriod::Monthly => self.monthly = value,
            LimitPeriod::Yearly => self.yearly = value,
        }
    }
}

/// User configuration read by the estimator and the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub ml_per_word: f64,
    pub show_float_button: bool,
    #[serde(default)]
    pub usage_limits: UsageLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ml_per_word: DEFAULT_ML_PER_WORD,
            show_float_button: true,
            usage_limits: UsageLimits::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_rate(self.ml_per_word)?;
        for period in LimitPeriod::ALL {
            if let Some(value) = self.usage_limits.get(period) {
                if !value.is_finite() || value <= 0.0 {
                    return Err(SettingsError::InvalidLimit { period, value });
                }
            }
        }
        Ok(())
    }
}

pub fn validate_rate(ml_per_word: f64) -> Result<(), SettingsError> {
    if ml_per_word.is_nan() || !(MIN_ML_PER_WORD..=MAX_ML_PER_WORD).contains(&ml_per_word) {
        return Err(SettingsError::RateOutOfRange(ml_per_word));
    }
    Ok(())
}

/// Milliliters per 100 words, the unit the settings page displays.
pub fn ml_per_100_words(ml_per_word: f64) -> f64 {
    ml_per_word * 100.0
}

/// Named rates offered next to the free-form input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    Conservative,
    Balanced,
    Optimistic,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Self::Conservative, Self::Balanced, Self::Optimistic];

    pub fn ml_per_word(&self) -> f64 {
        match self {
            Self::Conservative => 0.25,
            Self::Balanced => 0.15,
            Self::Optimistic => 0.08,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Optimistic => "optimistic",
        }
    }

    /// The preset a rate corresponds to, within 0.01 ml/word.
    pub fn matching(ml_per_word: f64) -> Option<Preset> {
        Self::ALL
            .into_iter()
            .find(|preset| (preset.ml_per_word() - ml_per_word).abs() < 0.01)
    }
}

impl FromStr for Preset {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SettingsError::UnknownPreset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.ml_per_word, 0.15);
        assert!(settings.show_float_button);
        assert_eq!(settings.usage_limits, UsageLimits::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rate_bounds_are_inclusive() {
        assert!(validate_rate(0.01).is_ok());
        assert!(validate_rate(1.0).is_ok());
        assert!(validate_rate(0.009).is_err());
        assert!(validate_rate(1.01).is_err());
        assert!(validate_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_rate_error_message_is_user_facing() {
        let err = validate_rate(5.0).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a value between 0.01 and 1.0");
    }

    #[test]
    fn test_non_positive_limit_rejected() {
        let mut settings = Settings::default();
        settings.usage_limits.monthly = Some(0.0);
        match settings.validate() {
            Err(SettingsError::InvalidLimit { period, .. }) => assert_eq!(period, LimitPeriod::Monthly),
            other => panic!("expected InvalidLimit, got {:?}", other),
        }

        settings.usage_limits.monthly = Some(12.5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_preset_matching() {
        assert_eq!(Preset::matching(0.15), Some(Preset::Balanced));
        assert_eq!(Preset::matching(0.245), Some(Preset::Conservative));
        assert_eq!(Preset::matching(0.5), None);
        assert_eq!("Optimistic".parse::<Preset>().unwrap(), Preset::Optimistic);
        assert!("extreme".parse::<Preset>().is_err());
    }

    #[test]
    fn test_limits_deserialize_nulls() {
        let limits: UsageLimits =
            serde_json::from_str(r#"{"weekly": 2.5, "monthly": null}"#).unwrap();
        assert_eq!(limits.weekly, Some(2.5));
        assert_eq!(limits.monthly, None);
        assert_eq!(limits.yearly, None);
    }
}
