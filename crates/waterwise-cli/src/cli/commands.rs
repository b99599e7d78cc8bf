use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};
use waterwise_core::constants::keys::CHAT_MESSAGES;
use waterwise_core::format::{format_badge, format_relative_time, format_water};
use waterwise_core::models::{ml_per_100_words, StoredEntry};
use waterwise_core::settings::{apply_preset, load_settings, reset_settings, save_settings};
use waterwise_core::store::object_or_empty;
use waterwise_core::summary::{cleanup_legacy_data, clear_all_data};
use waterwise_core::time::now_ms;
use waterwise_core::{
    mutation_channel, CoreConfig, JsonFileStore, KvStore, LimitPeriod, ObservationDriver, Page,
    Preset, Settings, SharedPage, Tracker, UsageSummary,
};

use super::protocol::{CliCommand, SettingsCommand};

/// Run one command to completion and print its JSON result on stdout.
pub fn run_command(command: CliCommand, pretty: bool, config: &CoreConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let output = runtime.block_on(execute(command, config))?;

    let text = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", text);
    Ok(())
}

pub async fn execute(command: CliCommand, config: &CoreConfig) -> Result<Value> {
    let store: Arc<dyn KvStore> = Arc::new(
        JsonFileStore::open(&config.data_dir)
            .await
            .with_context(|| format!("Failed to open store in {}", config.data_dir.display()))?,
    );

    match command {
        CliCommand::Scan {
            snapshots,
            interval_ms,
        } => {
            // Default spacing lets every snapshot settle into its own pass
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or(config.debounce * 2);
            scan(store, &snapshots, interval, config.debounce).await
        }
        CliCommand::Stats => stats(store.as_ref()).await,
        CliCommand::Settings(command) => settings(store.as_ref(), command).await,
        CliCommand::Clear => {
            clear_all_data(store.as_ref()).await?;
            Ok(json!({ "cleared": true }))
        }
        CliCommand::Cleanup => {
            let removed = cleanup_legacy_data(store.as_ref()).await?;
            Ok(json!({ "legacyDataRemoved": removed }))
        }
    }
}

async fn scan(
    store: Arc<dyn KvStore>,
    snapshots: &[PathBuf],
    interval: Duration,
    debounce: Duration,
) -> Result<Value> {
    let pages = snapshots
        .iter()
        .map(|path| Page::load(path))
        .collect::<Result<Vec<_>>>()?;
    info!("Replaying {} page snapshots", pages.len());

    let tracker = Arc::new(Tracker::new(store.clone()));
    let source = Arc::new(SharedPage::new());
    let (notifier, signals) = mutation_channel();
    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();

    let driver = tokio::spawn(
        ObservationDriver::new(tracker, source.clone(), debounce)
            .with_reports(reports_tx)
            .run(signals),
    );

    let mut chats = BTreeSet::new();
    for (i, page) in pages.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(interval).await;
        }
        debug!("Snapshot {}: {}", i, page.url);
        chats.insert(page.chat_id());
        source.replace(page);
        notifier.notify();
    }
    drop(notifier);

    let summary = driver.await.context("Observation driver stopped unexpectedly")?;
    let mut passes = Vec::new();
    while let Ok(report) = reports_rx.try_recv() {
        passes.push(report);
    }

    // Badge text for every message now stored in the scanned chats
    let stored = object_or_empty(&store.get(&[CHAT_MESSAGES]).await?, CHAT_MESSAGES);
    let mut badges = Map::new();
    for chat_id in chats {
        let messages: Map<String, Value> = stored
            .get(&chat_id)
            .and_then(Value::as_object)
            .map(|messages| {
                messages
                    .iter()
                    .map(|(id, entry)| {
                        let water = StoredEntry::from_value(entry).water_used();
                        (id.clone(), Value::from(format_badge(water)))
                    })
                    .collect()
            })
            .unwrap_or_default();
        badges.insert(chat_id, Value::Object(messages));
    }

    Ok(json!({
        "driver": summary,
        "passes": passes,
        "badges": badges,
    }))
}

async fn stats(store: &dyn KvStore) -> Result<Value> {
    let now = now_ms();
    let summary = UsageSummary::load(store, now).await?;

    let recent: Vec<Value> = summary
        .recent_chats
        .iter()
        .map(|chat| {
            json!({
                "title": chat.title,
                "water": format_water(chat.water_used),
                "updated": format_relative_time(chat.last_updated, now),
            })
        })
        .collect();

    let formatted = json!({
        "totalWater": format_water(summary.total_water),
        "comparison": summary.comparison,
        "recentChats": recent,
    });

    Ok(json!({
        "generatedAt": chrono::Utc::now().to_rfc3339(),
        "summary": summary,
        "formatted": formatted,
    }))
}

async fn settings(store: &dyn KvStore, command: SettingsCommand) -> Result<Value> {
    let settings = match command {
        SettingsCommand::Show => load_settings(store).await?,
        SettingsCommand::Set {
            ml_per_word,
            show_float_button,
            weekly,
            monthly,
            yearly,
        } => {
            let mut settings = load_settings(store).await?;
            if let Some(rate) = ml_per_word {
                settings.ml_per_word = rate;
            }
            if let Some(show) = show_float_button {
                settings.show_float_button = show;
            }
            for (period, value) in [
                (LimitPeriod::Weekly, weekly),
                (LimitPeriod::Monthly, monthly),
                (LimitPeriod::Yearly, yearly),
            ] {
                if let Some(limit) = value {
                    settings.usage_limits.set(period, limit.0);
                }
            }
            save_settings(store, &settings).await?;
            settings
        }
        SettingsCommand::Reset => reset_settings(store).await?,
        SettingsCommand::Preset { name } => {
            let preset: Preset = name.parse()?;
            apply_preset(store, preset).await?
        }
    };
    Ok(settings_json(&settings))
}

fn settings_json(settings: &Settings) -> Value {
    json!({
        "settings": settings,
        "mlPer100Words": ml_per_100_words(settings.ml_per_word),
        "preset": Preset::matching(settings.ml_per_word).map(|preset| preset.name()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::protocol::LimitValue;
    use std::path::Path;

    fn config(dir: &Path) -> CoreConfig {
        CoreConfig::new(dir).with_debounce(Duration::from_millis(10))
    }

    fn write_snapshot(dir: &Path, name: &str, chat: &str, messages: &[(&str, &str)]) -> PathBuf {
        let children: Vec<Value> = messages
            .iter()
            .map(|(id, text)| {
                json!({
                    "tag": "div",
                    "attributes": {
                        "data-message-author-role": "assistant",
                        "data-message-id": id
                    },
                    "children": [{"tag": "div", "classes": ["markdown", "prose"], "text": text}]
                })
            })
            .collect();
        let page = json!({
            "url": format!("https://chatgpt.com/c/{}", chat),
            "root": {"tag": "body", "children": [{"tag": "main", "children": children}]}
        });
        let path = dir.join(name);
        std::fs::write(&path, page.to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_scan_then_stats() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let first = write_snapshot(dir.path(), "1.json", "abc", &[("m1", "ten words of text here to make the count right")]);
        let second = write_snapshot(
            dir.path(),
            "2.json",
            "abc",
            &[("m1", "ten words of text here to make the count right"), ("m2", "two words")],
        );

        let output = execute(
            CliCommand::Scan {
                snapshots: vec![first, second],
                interval_ms: Some(80),
            },
            &config,
        )
        .await
        .unwrap();
        assert_eq!(output["driver"]["signals"], json!(2));
        assert_eq!(output["badges"]["abc"]["m2"], json!("0.30ml water"));

        let stats = execute(CliCommand::Stats, &config).await.unwrap();
        assert_eq!(stats["summary"]["chatCount"], json!(1));
        assert_eq!(stats["summary"]["messageCount"], json!(2));
        let total = stats["summary"]["totalWater"].as_f64().unwrap();
        assert!((total - 12.0 * 0.15 / 1000.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_scan_rejects_bad_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();

        let result = execute(
            CliCommand::Scan {
                snapshots: vec![path],
                interval_ms: None,
            },
            &config(dir.path()),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_settings_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let shown = execute(CliCommand::Settings(SettingsCommand::Show), &config).await.unwrap();
        assert_eq!(shown["preset"], json!("balanced"));

        let set = SettingsCommand::Set {
            ml_per_word: Some(0.25),
            show_float_button: Some(false),
            weekly: Some(LimitValue(Some(2.0))),
            monthly: None,
            yearly: None,
        };
        let updated = execute(CliCommand::Settings(set), &config).await.unwrap();
        assert_eq!(updated["preset"], json!("conservative"));
        assert_eq!(updated["settings"]["usageLimits"]["weekly"], json!(2.0));

        let rejected = SettingsCommand::Set {
            ml_per_word: Some(5.0),
            show_float_button: None,
            weekly: None,
            monthly: None,
            yearly: None,
        };
        let err = execute(CliCommand::Settings(rejected), &config).await.unwrap_err();
        assert!(err.to_string().contains("between 0.01 and 1.0"));

        let preset = SettingsCommand::Preset { name: "optimistic".to_string() };
        let applied = execute(CliCommand::Settings(preset), &config).await.unwrap();
        assert_eq!(applied["settings"]["mlPerWord"], json!(0.08));

        let reset = execute(CliCommand::Settings(SettingsCommand::Reset), &config).await.unwrap();
        assert_eq!(reset["settings"]["mlPerWord"], json!(0.15));
        assert_eq!(reset["settings"]["showFloatButton"], json!(true));
        assert_eq!(reset["settings"]["usageLimits"]["weekly"], json!(2.0));
    }

    #[tokio::test]
    async fn test_clear_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("storage.json"),
            r#"{"processedMessages": ["x"], "totalWater": 1.0}"#,
        )
        .unwrap();
        let config = config(dir.path());

        let cleaned = execute(CliCommand::Cleanup, &config).await.unwrap();
        assert_eq!(cleaned["legacyDataRemoved"], json!(true));

        execute(CliCommand::Clear, &config).await.unwrap();
        let stats = execute(CliCommand::Stats, &config).await.unwrap();
        assert_eq!(stats["summary"]["totalWater"], json!(0.0));
    }
}
