//! Reading and writing the user configuration keys.

use serde_json::Value;
use tracing::{debug, info};

use crate::constants::keys::{ML_PER_WORD, SHOW_FLOAT_BUTTON, USAGE_LIMITS};
use crate::constants::DEFAULT_ML_PER_WORD;
use crate::error::{SettingsError, StoreError};
use crate::models::{Preset, Settings, UsageLimits};
use crate::store::{Document, KvStore};

/// Rate stored under `mlPerWord`, falling back to the default for missing,
/// non-numeric or zero values.
pub fn ml_per_word_from(value: Option<&Value>) -> f64 {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(DEFAULT_ML_PER_WORD)
}

pub fn show_float_button_from(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(true)
}

pub fn usage_limits_from(value: Option<&Value>) -> UsageLimits {
    value
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

pub fn settings_from(doc: &Document) -> Settings {
    Settings {
        ml_per_word: ml_per_word_from(doc.get(ML_PER_WORD)),
        show_float_button: show_float_button_from(doc.get(SHOW_FLOAT_BUTTON)),
        usage_limits: usage_limits_from(doc.get(USAGE_LIMITS)),
    }
}

pub async fn load_settings(store: &dyn KvStore) -> Result<Settings, StoreError> {
    let doc = store.get(&[ML_PER_WORD, SHOW_FLOAT_BUTTON, USAGE_LIMITS]).await?;
    Ok(settings_from(&doc))
}

/// Validate and persist. A rejected value leaves the store untouched.
pub async fn save_settings(store: &dyn KvStore, settings: &Settings) -> Result<(), SettingsError> {
    settings.validate()?;

    let mut items = Document::new();
    items.insert(ML_PER_WORD.to_string(), Value::from(settings.ml_per_word));
    items.insert(SHOW_FLOAT_BUTTON.to_string(), Value::from(settings.show_float_button));
    items.insert(
        USAGE_LIMITS.to_string(),
        serde_json::to_value(settings.usage_limits).map_err(StoreError::from)?,
    );
    store.set(items).await?;

    info!("Settings saved: {} ml/word", settings.ml_per_word);
    Ok(())
}

/// Restore the default rate and button visibility. Limits are kept.
pub async fn reset_settings(store: &dyn KvStore) -> Result<Settings, SettingsError> {
    let mut settings = load_settings(store).await?;
    let defaults = Settings::default();
    settings.ml_per_word = defaults.ml_per_word;
    settings.show_float_button = defaults.show_float_button;
    save_settings(store, &settings).await?;
    debug!("Settings reset to defaults");
    Ok(settings)
}

pub async fn apply_preset(store: &dyn KvStore, preset: Preset) -> Result<Settings, SettingsError> {
    let mut settings = load_settings(store).await?;
    settings.ml_per_word = preset.ml_per_word();
    save_settings(store, &settings).await?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_defaults_on_empty_store() {
        let store = MemoryStore::new();
        assert_eq!(load_settings(&store).await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_malformed_values_fall_back() {
        let store = MemoryStore::new();
        store
            .set(
                json!({"mlPerWord": "fast", "showFloatButton": "yes", "usageLimits": 3})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(load_settings(&store).await.unwrap(), Settings::default());
    }

    #[test]
    fn test_zero_rate_falls_back_to_default() {
        assert_eq!(ml_per_word_from(Some(&json!(0))), DEFAULT_ML_PER_WORD);
        assert_eq!(ml_per_word_from(Some(&json!(0.3))), 0.3);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = MemoryStore::new();
        let mut settings = Settings::default();
        settings.ml_per_word = 0.4;
        settings.show_float_button = false;
        settings.usage_limits.weekly = Some(1.5);
        save_settings(&store, &settings).await.unwrap();

        assert_eq!(load_settings(&store).await.unwrap(), settings);
        let doc = store.get_all().await.unwrap();
        assert_eq!(doc["usageLimits"], json!({"weekly": 1.5, "monthly": null, "yearly": null}));
    }

    #[tokio::test]
    async fn test_invalid_settings_leave_store_unchanged() {
        let store = MemoryStore::new();
        save_settings(&store, &Settings::default()).await.unwrap();
        let before = store.get_all().await.unwrap();

        let mut settings = Settings::default();
        settings.ml_per_word = 2.0;
        assert!(matches!(
            save_settings(&store, &settings).await,
            Err(SettingsError::RateOutOfRange(_))
        ));

        let mut settings = Settings::default();
        settings.usage_limits.yearly = Some(-1.0);
        assert!(matches!(
            save_settings(&store, &settings).await,
            Err(SettingsError::InvalidLimit { .. })
        ));

        assert_eq!(store.get_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_reset_keeps_limits() {
        let store = MemoryStore::new();
        let mut settings = Settings::default();
        settings.ml_per_word = 0.9;
        settings.usage_limits.monthly = Some(10.0);
        save_settings(&store, &settings).await.unwrap();

        let reset = reset_settings(&store).await.unwrap();
        assert_eq!(reset.ml_per_word, DEFAULT_ML_PER_WORD);
        assert_eq!(reset.usage_limits.monthly, Some(10.0));
    }

    #[tokio::test]
    async fn test_apply_preset() {
        let store = MemoryStore::new();
        let settings = apply_preset(&store, Preset::Conservative).await.unwrap();
        assert_eq!(settings.ml_per_word, 0.25);
        assert_eq!(load_settings(&store).await.unwrap().ml_per_word, 0.25);
    }
}
