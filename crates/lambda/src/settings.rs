//! Function settings read from the Lambda environment

use std::collections::BTreeMap;
use std::time::Duration;
use summary_notifier_domain::usecases::NotifyConfig;
use summary_notifier_domain::{AlertFormat, NotifierConfig, SummarizerConfig, SummarizerProvider};
use thiserror::Error;

const DEFAULT_LOOKBACK_DAYS: u32 = 3;
const DEFAULT_DELIVERY_INTERVAL_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

fn required<L>(lookup: &L, name: &'static str) -> Result<String, SettingsError>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or(SettingsError::Missing(name))
}

fn parsed<L, T>(lookup: &L, name: &'static str, default: T) -> Result<T, SettingsError>
where
    L: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| SettingsError::Invalid {
            name,
            message: e.to_string(),
        }),
    }
}

fn json<L, T>(lookup: &L, name: &'static str) -> Result<T, SettingsError>
where
    L: Fn(&str) -> Option<String>,
    T: serde::de::DeserializeOwned,
{
    let raw = required(lookup, name)?;
    serde_json::from_str(&raw).map_err(|e| SettingsError::Invalid {
        name,
        message: e.to_string(),
    })
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Crawler function settings
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    pub table_name: String,
    pub lookback_days: u32,
}

impl CrawlerSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        Ok(Self {
            table_name: required(&lookup, "DDB_TABLE_NAME")?,
            lookback_days: parsed(&lookup, "NOTIFICATION_LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?,
        })
    }
}

/// Notifier function settings
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub provider: SummarizerProvider,
    /// Secure parameter with the provider's API key
    pub api_key_parameter: Option<String>,
    pub model_id: String,
    pub model_region: String,
    /// History table
    pub table_name: String,
    pub notify: NotifyConfig,
}

impl NotifierSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let notifiers: BTreeMap<String, NotifierConfig> = json(&lookup, "NOTIFIERS")?;
        let summarizers: BTreeMap<String, SummarizerConfig> = json(&lookup, "SUMMARIZERS")?;

        for (name, notifier) in &notifiers {
            if !summarizers.contains_key(&notifier.summarizer_name) {
                return Err(SettingsError::Invalid {
                    name: "NOTIFIERS",
                    message: format!(
                        "notifier {} references unknown summarizer {}",
                        name, notifier.summarizer_name
                    ),
                });
            }
        }

        let interval_ms = parsed(&lookup, "DELIVERY_INTERVAL_MS", DEFAULT_DELIVERY_INTERVAL_MS)?;

        let provider = match lookup("SUMMARIZER_PROVIDER") {
            None => SummarizerProvider::default(),
            Some(value) => {
                SummarizerProvider::parse(&value).ok_or_else(|| SettingsError::Invalid {
                    name: "SUMMARIZER_PROVIDER",
                    message: format!("unknown provider {}", value),
                })?
            }
        };
        let api_key_parameter = match provider {
            SummarizerProvider::Anthropic => Some(required(&lookup, "ANTHROPIC_API_KEY_PARAMETER")?),
            SummarizerProvider::Bedrock | SummarizerProvider::Stub => None,
        };

        Ok(Self {
            provider,
            api_key_parameter,
            model_id: required(&lookup, "MODEL_ID")?,
            model_region: required(&lookup, "MODEL_REGION")?,
            table_name: required(&lookup, "DDB_TABLE_NAME")?,
            notify: NotifyConfig {
                notifiers,
                summarizers,
                delivery_interval: Duration::from_millis(interval_ms),
            },
        })
    }
}

/// Alerter function settings
#[derive(Debug, Clone)]
pub struct AlerterSettings {
    pub topic_arn: String,
    pub format: AlertFormat,
}

impl AlerterSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let format = match lookup("ALERT_FORMAT") {
            None => AlertFormat::default(),
            Some(value) => AlertFormat::parse(&value).ok_or_else(|| SettingsError::Invalid {
                name: "ALERT_FORMAT",
                message: format!("unknown format {}", value),
            })?,
        };

        Ok(Self {
            topic_arn: required(&lookup, "SNS_TOPIC_ARN")?,
            format,
        })
    }
}
