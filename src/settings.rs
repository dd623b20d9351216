use crate::classifier::gemini::DEFAULT_MODEL;
use crate::store::{KeyValueStore, StoreError, SETTINGS_KEY};
use log::{debug, warn};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// Accepts both the numeric format (1-5) and the string format ("trace", "debug", etc.)
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LogLevelVisitor;

        impl<'de> Visitor<'de> for LogLevelVisitor {
            type Value = LogLevel;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or integer representing log level")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<LogLevel, E> {
                match value.to_lowercase().as_str() {
                    "trace" => Ok(LogLevel::Trace),
                    "debug" => Ok(LogLevel::Debug),
                    "info" => Ok(LogLevel::Info),
                    "warn" => Ok(LogLevel::Warn),
                    "error" => Ok(LogLevel::Error),
                    _ => Err(E::unknown_variant(
                        value,
                        &["trace", "debug", "info", "warn", "error"],
                    )),
                }
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<LogLevel, E> {
                match value {
                    1 => Ok(LogLevel::Trace),
                    2 => Ok(LogLevel::Debug),
                    3 => Ok(LogLevel::Info),
                    4 => Ok(LogLevel::Warn),
                    5 => Ok(LogLevel::Error),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(value), &"1-5")),
                }
            }
        }

        deserializer.deserialize_any(LogLevelVisitor)
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub fn get_default_settings() -> AppSettings {
    AppSettings {
        api_key: None,
        model: default_model(),
        request_timeout_secs: default_request_timeout_secs(),
        log_level: default_log_level(),
    }
}

impl AppSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// The environment variable wins over the stored key.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
    }
}

pub fn load_or_create_app_settings(store: &dyn KeyValueStore) -> AppSettings {
    match store.get(SETTINGS_KEY) {
        Some(raw) => match serde_json::from_str::<AppSettings>(&raw) {
            Ok(settings) => {
                debug!(
                    "Found existing settings: model={}, timeout={}s, log_level={:?}",
                    settings.model, settings.request_timeout_secs, settings.log_level
                );
                settings
            }
            Err(e) => {
                warn!("Failed to parse settings: {}", e);
                // Fall back to default settings if parsing fails
                let default_settings = get_default_settings();
                store_defaults(store, &default_settings);
                default_settings
            }
        },
        None => {
            let default_settings = get_default_settings();
            store_defaults(store, &default_settings);
            default_settings
        }
    }
}

fn store_defaults(store: &dyn KeyValueStore, settings: &AppSettings) {
    if let Err(e) = write_settings(store, settings) {
        warn!("Failed to store default settings: {}", e);
    }
}

pub fn get_settings(store: &dyn KeyValueStore) -> AppSettings {
    store
        .get(SETTINGS_KEY)
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_else(get_default_settings)
}

pub fn write_settings(store: &dyn KeyValueStore, settings: &AppSettings) -> Result<(), StoreError> {
    store.set(SETTINGS_KEY, serde_json::to_string(settings)?)
}
