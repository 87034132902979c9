//! Deployment configuration
//!
//! Every recognised field is enumerated here with an explicit default.
//! Destinations, prompt versions and schedules are resolved while parsing,
//! so a value of these types is always well formed; cross references
//! (summarizer names, required fields) are checked by
//! [`DeploymentConfig::validate`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::schedule::CronSchedule;

/// Errors in the deployment configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("model_id must not be empty")]
    MissingModelId,
    #[error("model_region must not be empty")]
    MissingModelRegion,
    #[error("no notifiers configured")]
    NoNotifiers,
    #[error("notifier '{notifier}' references unknown summarizer '{summarizer}'")]
    UnknownSummarizer { notifier: String, summarizer: String },
    #[error("notifier '{notifier}': {message}")]
    InvalidNotifier { notifier: String, message: String },
    #[error("notification_lookback_days must be at least 1")]
    InvalidLookback,
    #[error("summarizer_provider 'anthropic' requires anthropic_api_key_parameter")]
    MissingApiKeyParameter,
    #[error("{0}")]
    Invalid(String),
}

/// Validated deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Foundation model used for summaries
    #[serde(default, alias = "modelId")]
    pub model_id: String,
    /// Region the model is invoked in
    #[serde(default, alias = "modelRegion")]
    pub model_region: String,
    #[serde(default)]
    pub notifiers: BTreeMap<String, NotifierConfig>,
    #[serde(default)]
    pub summarizers: BTreeMap<String, SummarizerConfig>,
    /// Age in days beyond which feeds and entries are ignored
    #[serde(default = "default_lookback_days", alias = "notificationLookbackDays")]
    pub notification_lookback_days: u32,
    /// Backend that produces summaries
    #[serde(default, alias = "summarizerProvider")]
    pub summarizer_provider: SummarizerProvider,
    /// Secure parameter holding the Anthropic API key
    #[serde(
        default,
        alias = "anthropicApiKeyParameter",
        skip_serializing_if = "Option::is_none"
    )]
    pub anthropic_api_key_parameter: Option<String>,
    #[serde(default)]
    pub stack: StackSettings,
}

impl DeploymentConfig {
    /// Check cross references between sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::MissingModelId);
        }
        if self.model_region.trim().is_empty() {
            return Err(ConfigError::MissingModelRegion);
        }
        if self.notification_lookback_days == 0 {
            return Err(ConfigError::InvalidLookback);
        }
        if self.notifiers.is_empty() {
            return Err(ConfigError::NoNotifiers);
        }
        if self.summarizer_provider == SummarizerProvider::Anthropic
            && self.api_key_parameter().is_none()
        {
            return Err(ConfigError::MissingApiKeyParameter);
        }

        for (name, notifier) in &self.notifiers {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("notifier names must not be empty".into()));
            }
            if !self.summarizers.contains_key(&notifier.summarizer_name) {
                return Err(ConfigError::UnknownSummarizer {
                    notifier: name.clone(),
                    summarizer: notifier.summarizer_name.clone(),
                });
            }
            if notifier.max_old_days == Some(0) {
                return Err(ConfigError::InvalidNotifier {
                    notifier: name.clone(),
                    message: "max_old_days must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Look-back window for a notifier
    pub fn lookback_days_for(&self, notifier: &NotifierConfig) -> u32 {
        notifier
            .max_old_days
            .unwrap_or(self.notification_lookback_days)
    }

    /// All secure parameter names referenced by destinations, sorted
    pub fn referenced_parameters(&self) -> BTreeSet<String> {
        self.notifiers
            .values()
            .flat_map(|n| n.destinations.iter())
            .map(|d| d.parameter_name().to_string())
            .collect()
    }

    /// API key parameter of the selected provider, if it needs one
    pub fn api_key_parameter(&self) -> Option<&str> {
        match self.summarizer_provider {
            SummarizerProvider::Anthropic => self
                .anthropic_api_key_parameter
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty()),
            SummarizerProvider::Bedrock | SummarizerProvider::Stub => None,
        }
    }

    /// Whether any destination delivers through a topic
    pub fn has_topic_destinations(&self) -> bool {
        self.notifiers
            .values()
            .flat_map(|n| n.destinations.iter())
            .any(|d| matches!(d.channel(), Channel::Topic { .. }))
    }
}

/// A named feed source with its schedule and destinations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNotifierConfig", into = "RawNotifierConfig")]
pub struct NotifierConfig {
    /// Crawl schedule; hourly on the hour when not configured
    pub schedule: CronSchedule,
    pub summarizer_name: String,
    /// Feed label -> feed URL
    pub rss_urls: BTreeMap<String, String>,
    pub destinations: Vec<Destination>,
    pub prompt_version: PromptVersion,
    /// Overrides the deployment-wide look-back window
    pub max_old_days: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct RawNotifierConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schedule: Option<CronSchedule>,
    #[serde(alias = "summarizerName")]
    summarizer_name: String,
    #[serde(alias = "rssUrl", alias = "rss_url")]
    rss_urls: BTreeMap<String, String>,
    #[serde(default)]
    destinations: Vec<Destination>,
    // Single-destination form used by older configurations
    #[serde(default, skip_serializing)]
    destination: Option<String>,
    #[serde(default, alias = "webhookUrlParameterName", skip_serializing)]
    webhook_url_parameter_name: Option<String>,
    #[serde(default, alias = "promptVersion")]
    prompt_version: PromptVersion,
    #[serde(default, alias = "maxOldDays", skip_serializing_if = "Option::is_none")]
    max_old_days: Option<u32>,
}

impl TryFrom<RawNotifierConfig> for NotifierConfig {
    type Error = ConfigError;

    fn try_from(raw: RawNotifierConfig) -> Result<Self, Self::Error> {
        let schedule = raw.schedule.unwrap_or_else(CronSchedule::hourly);
        schedule
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("schedule: {}", e)))?;

        if raw.rss_urls.is_empty() {
            return Err(ConfigError::Invalid("rss_urls must not be empty".into()));
        }

        let mut destinations = raw.destinations;
        if destinations.is_empty() {
            if let Some(parameter_name) = raw.webhook_url_parameter_name {
                let kind = raw.destination.unwrap_or_else(|| "slack".to_string());
                destinations.push(Destination::try_from(RawDestination {
                    kind,
                    delivery: default_delivery(),
                    parameter_name,
                })?);
            }
        }
        if destinations.is_empty() {
            return Err(ConfigError::Invalid("at least one destination is required".into()));
        }

        Ok(Self {
            schedule,
            summarizer_name: raw.summarizer_name,
            rss_urls: raw.rss_urls,
            destinations,
            prompt_version: raw.prompt_version,
            max_old_days: raw.max_old_days,
        })
    }
}

impl From<NotifierConfig> for RawNotifierConfig {
    fn from(config: NotifierConfig) -> Self {
        Self {
            schedule: Some(config.schedule),
            summarizer_name: config.summarizer_name,
            rss_urls: config.rss_urls,
            destinations: config.destinations,
            destination: None,
            webhook_url_parameter_name: None,
            prompt_version: config.prompt_version,
            max_old_days: config.max_old_days,
        }
    }
}

/// How a destination's message reaches it. The parameter holds the
/// webhook URL or the topic ARN respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Webhook { parameter_name: String },
    Topic { parameter_name: String },
}

impl Channel {
    pub fn parameter_name(&self) -> &str {
        match self {
            Channel::Webhook { parameter_name } | Channel::Topic { parameter_name } => {
                parameter_name
            }
        }
    }
}

/// A delivery target, one variant per message format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDestination", into = "RawDestination")]
pub enum Destination {
    /// Item fields as flat JSON, for Slack workflow webhooks
    Slack { channel: Channel },
    /// Slack Block Kit message
    SlackBlocks { channel: Channel },
    /// Teams adaptive card
    Teams { channel: Channel },
}

impl Destination {
    pub fn channel(&self) -> &Channel {
        match self {
            Destination::Slack { channel }
            | Destination::SlackBlocks { channel }
            | Destination::Teams { channel } => channel,
        }
    }

    pub fn parameter_name(&self) -> &str {
        self.channel().parameter_name()
    }

    /// Configuration tag of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Slack { .. } => "slack",
            Destination::SlackBlocks { .. } => "slackfree",
            Destination::Teams { .. } => "teams",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawDestination {
    #[serde(rename = "type")]
    kind: String,
    #[serde(
        default = "default_delivery",
        alias = "distinationType",
        alias = "destinationType",
        alias = "destination_type"
    )]
    delivery: String,
    #[serde(alias = "parameterName")]
    parameter_name: String,
}

fn default_delivery() -> String {
    "URL".to_string()
}

impl TryFrom<RawDestination> for Destination {
    type Error = ConfigError;

    fn try_from(raw: RawDestination) -> Result<Self, Self::Error> {
        let parameter_name = raw.parameter_name.trim().to_string();
        if parameter_name.is_empty() {
            return Err(ConfigError::Invalid(
                "destination parameter_name must not be empty".into(),
            ));
        }

        let channel = match raw.delivery.to_ascii_uppercase().as_str() {
            "URL" | "WEBHOOK" => Channel::Webhook { parameter_name },
            "SNS" | "TOPIC" => Channel::Topic { parameter_name },
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown destination delivery '{}'",
                    other
                )));
            }
        };

        match raw.kind.to_ascii_lowercase().as_str() {
            "slack" => Ok(Destination::Slack { channel }),
            "slackfree" => Ok(Destination::SlackBlocks { channel }),
            "teams" => Ok(Destination::Teams { channel }),
            other => Err(ConfigError::Invalid(format!(
                "unknown destination type '{}'",
                other
            ))),
        }
    }
}

impl From<Destination> for RawDestination {
    fn from(destination: Destination) -> Self {
        let kind = destination.kind().to_string();
        let (delivery, parameter_name) = match destination.channel().clone() {
            Channel::Webhook { parameter_name } => ("URL", parameter_name),
            Channel::Topic { parameter_name } => ("SNS", parameter_name),
        };
        Self {
            kind,
            delivery: delivery.to_string(),
            parameter_name,
        }
    }
}

/// Prompt template generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVersion {
    #[default]
    #[serde(alias = "default")]
    V1,
    /// Adds a target audience of busy practitioners
    V2,
}

/// Persona and language for a summarizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(alias = "outputLanguage")]
    pub output_language: String,
    pub persona: String,
}

/// Format of republished log alerts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertFormat {
    /// Raw log line with message attributes
    #[default]
    Plain,
    /// Chat client custom notification document
    Chatbot,
}

impl AlertFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertFormat::Plain => "plain",
            AlertFormat::Chatbot => "chatbot",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" => Some(AlertFormat::Plain),
            "chatbot" => Some(AlertFormat::Chatbot),
            _ => None,
        }
    }
}

/// Backend used by the notifier to summarize articles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizerProvider {
    #[default]
    Bedrock,
    /// Messages API, keyed by a secure parameter
    Anthropic,
    /// Echoes the title; no model calls
    Stub,
}

impl SummarizerProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarizerProvider::Bedrock => "bedrock",
            SummarizerProvider::Anthropic => "anthropic",
            SummarizerProvider::Stub => "stub",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bedrock" => Some(SummarizerProvider::Bedrock),
            "anthropic" => Some(SummarizerProvider::Anthropic),
            "stub" => Some(SummarizerProvider::Stub),
            _ => None,
        }
    }
}

/// Settings of the synthesized stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSettings {
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    #[serde(default = "default_crawler_function")]
    pub crawler: FunctionSettings,
    #[serde(default = "default_notifier_function")]
    pub notifier: FunctionSettings,
    #[serde(default = "default_alerter_function")]
    pub alerter: FunctionSettings,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
    /// Email endpoints subscribed to the alert topic
    #[serde(default)]
    pub alert_emails: Vec<String>,
    #[serde(default)]
    pub alert_format: AlertFormat,
    /// Pause between deliveries of one item, in milliseconds
    #[serde(default = "default_delivery_interval_ms")]
    pub delivery_interval_ms: u64,
}

/// Location of the function bundles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSettings {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_crawler_key")]
    pub crawler_key: String,
    #[serde(default = "default_notifier_key")]
    pub notifier_key: String,
    #[serde(default = "default_alerter_key")]
    pub alerter_key: String,
}

/// Sizing of a single function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSettings {
    pub timeout_secs: u32,
    pub memory_mb: u32,
}

fn default_lookback_days() -> u32 {
    3
}

fn default_description() -> String {
    "News feed summary and notification pipeline".to_string()
}

fn default_crawler_function() -> FunctionSettings {
    FunctionSettings {
        timeout_secs: 60,
        memory_mb: 256,
    }
}

fn default_notifier_function() -> FunctionSettings {
    FunctionSettings {
        timeout_secs: 180,
        memory_mb: 256,
    }
}

fn default_alerter_function() -> FunctionSettings {
    FunctionSettings {
        timeout_secs: 30,
        memory_mb: 128,
    }
}

fn default_log_retention_days() -> u32 {
    14
}

fn default_delivery_interval_ms() -> u64 {
    500
}

fn default_crawler_key() -> String {
    "crawler.zip".to_string()
}

fn default_notifier_key() -> String {
    "notifier.zip".to_string()
}

fn default_alerter_key() -> String {
    "alerter.zip".to_string()
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            description: default_description(),
            artifacts: ArtifactSettings::default(),
            crawler: default_crawler_function(),
            notifier: default_notifier_function(),
            alerter: default_alerter_function(),
            log_retention_days: default_log_retention_days(),
            alert_emails: vec![],
            alert_format: AlertFormat::default(),
            delivery_interval_ms: default_delivery_interval_ms(),
        }
    }
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            crawler_key: default_crawler_key(),
            notifier_key: default_notifier_key(),
            alerter_key: default_alerter_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> serde_json::Value {
        json!({
            "modelId": "anthropic.claude-3-haiku-20240307-v1:0",
            "modelRegion": "us-east-1",
            "summarizers": {
                "architect": {"outputLanguage": "English.", "persona": "solutions architect"}
            },
            "notifiers": {
                "aws-blog": {
                    "summarizerName": "architect",
                    "rssUrl": {"What's new": "https://aws.amazon.com/about-aws/whats-new/recent/feed/"},
                    "destinations": [
                        {"type": "slack", "distinationType": "URL", "parameterName": "/notify/aws-blog/slack"}
                    ]
                }
            }
        })
    }

    #[test]
    fn test_parses_original_camel_case_layout() {
        let config: DeploymentConfig = serde_json::from_value(sample_json()).unwrap();
        config.validate().unwrap();

        let notifier = &config.notifiers["aws-blog"];
        assert_eq!(notifier.schedule, CronSchedule::hourly());
        assert_eq!(notifier.prompt_version, PromptVersion::V1);
        assert_eq!(config.notification_lookback_days, 3);
        assert_eq!(
            notifier.destinations,
            vec![Destination::Slack {
                channel: Channel::Webhook {
                    parameter_name: "/notify/aws-blog/slack".to_string()
                }
            }]
        );
    }

    #[test]
    fn test_unknown_destination_type_fails_at_parse_time() {
        let mut value = sample_json();
        value["notifiers"]["aws-blog"]["destinations"][0]["type"] = json!("carrier-pigeon");

        let err = serde_json::from_value::<DeploymentConfig>(value).unwrap_err();
        assert!(err.to_string().contains("unknown destination type"));
    }

    #[test]
    fn test_unknown_summarizer_rejected() {
        let mut value = sample_json();
        value["notifiers"]["aws-blog"]["summarizerName"] = json!("missing");

        let config: DeploymentConfig = serde_json::from_value(value).unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownSummarizer {
                notifier: "aws-blog".to_string(),
                summarizer: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_legacy_single_destination_form() {
        let mut value = sample_json();
        let notifier = value["notifiers"]["aws-blog"].as_object_mut().unwrap();
        notifier.remove("destinations");
        notifier.insert("destination".into(), json!("teams"));
        notifier.insert("webhookUrlParameterName".into(), json!("/WhatsNew/URL"));

        let config: DeploymentConfig = serde_json::from_value(value).unwrap();
        let destinations = &config.notifiers["aws-blog"].destinations;
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations[0].kind(), "teams");
        assert_eq!(destinations[0].parameter_name(), "/WhatsNew/URL");
    }

    #[test]
    fn test_notifier_without_destinations_rejected() {
        let mut value = sample_json();
        value["notifiers"]["aws-blog"]["destinations"] = json!([]);

        assert!(serde_json::from_value::<DeploymentConfig>(value).is_err());
    }

    #[test]
    fn test_prompt_version_default_alias() {
        let mut value = sample_json();
        value["notifiers"]["aws-blog"]["promptVersion"] = json!("default");

        let config: DeploymentConfig = serde_json::from_value(value).unwrap();
        assert_eq!(config.notifiers["aws-blog"].prompt_version, PromptVersion::V1);
    }

    #[test]
    fn test_notifier_serialization_round_trips_through_payload() {
        let config: DeploymentConfig = serde_json::from_value(sample_json()).unwrap();
        let notifier = config.notifiers["aws-blog"].clone();

        let encoded = serde_json::to_value(&notifier).unwrap();
        assert_eq!(encoded["destinations"][0]["type"], "slack");
        assert_eq!(encoded["destinations"][0]["delivery"], "URL");
        assert_eq!(encoded["schedule"]["minute"], "0");

        let decoded: NotifierConfig = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, notifier);
    }

    #[test]
    fn test_referenced_parameters_are_deduplicated() {
        let mut value = sample_json();
        value["notifiers"]["aws-blog"]["destinations"] = json!([
            {"type": "slack", "parameterName": "/notify/shared"},
            {"type": "teams", "parameterName": "/notify/shared"},
            {"type": "slackfree", "distinationType": "SNS", "parameterName": "/notify/topic"}
        ]);

        let config: DeploymentConfig = serde_json::from_value(value).unwrap();
        let params: Vec<_> = config.referenced_parameters().into_iter().collect();
        assert_eq!(params, vec!["/notify/shared", "/notify/topic"]);
        assert!(config.has_topic_destinations());
    }

    #[test]
    fn test_provider_defaults_to_bedrock() {
        let config: DeploymentConfig = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(config.summarizer_provider, SummarizerProvider::Bedrock);
        assert_eq!(config.api_key_parameter(), None);
    }

    #[test]
    fn test_anthropic_provider_requires_key_parameter() {
        let mut value = sample_json();
        value["summarizerProvider"] = json!("anthropic");

        let config: DeploymentConfig = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::MissingApiKeyParameter));

        value["anthropicApiKeyParameter"] = json!("/summary-notifier/anthropic-key");
        let config: DeploymentConfig = serde_json::from_value(value).unwrap();
        config.validate().unwrap();
        assert_eq!(
            config.api_key_parameter(),
            Some("/summary-notifier/anthropic-key")
        );
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!(
            SummarizerProvider::parse(" Anthropic "),
            Some(SummarizerProvider::Anthropic)
        );
        assert_eq!(SummarizerProvider::parse("stub"), Some(SummarizerProvider::Stub));
        assert_eq!(SummarizerProvider::parse("openai"), None);
    }
}
