//! Deployment configuration loading

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use summary_notifier_domain::DeploymentConfig;

/// Used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "./summary-notifier.toml";

/// Prefix of environment overrides, e.g. `SUMMARY_NOTIFIER__MODEL_REGION`
pub const ENV_PREFIX: &str = "SUMMARY_NOTIFIER";

/// Load the deployment configuration from file and environment.
///
/// The file may be TOML or JSON (by extension) and keeps the case of its
/// keys, so notifier names, summarizer names and feed labels are used as
/// written. Environment variables override single values; nested keys are
/// separated by `__` and match existing keys regardless of case, `_` and `-`.
pub fn load(config_path: Option<&Path>) -> Result<DeploymentConfig> {
    load_with(config_path, environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn load_with(config_path: Option<&Path>, env: config::Environment) -> Result<DeploymentConfig> {
    let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let path = config_path.unwrap_or(&default_path);

    let mut document = if path.exists() {
        read_document(path)?
    } else if config_path.is_some() {
        anyhow::bail!("Config file not found: {}", path.display());
    } else {
        Value::Object(Map::new())
    };

    let overrides: Value = config::Config::builder()
        .add_source(env)
        .build()
        .and_then(|c| c.try_deserialize())
        .context("Failed to read environment overrides")?;
    merge(&mut document, overrides);

    serde_json::from_value(document).context("Failed to deserialize configuration")
}

fn read_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

/// Apply `overrides` onto `base`, descending into tables present in both
fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                let existing = if base.contains_key(&key) {
                    key
                } else {
                    base.keys()
                        .find(|k| same_key(k, &key))
                        .cloned()
                        .unwrap_or(key)
                };
                merge(base.entry(existing).or_insert(Value::Null), value);
            }
        }
        (base, overrides) => *base = overrides,
    }
}

/// `summarizerName`, `summarizer_name` and `SUMMARIZER_NAME` are the same key
fn same_key(a: &str, b: &str) -> bool {
    let normalize = |s: &str| {
        s.chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect::<String>()
    };
    normalize(a) == normalize(b)
}

/// Example configuration as a TOML string
pub fn example_toml() -> &'static str {
    r#"# summary-notifier deployment configuration

# Foundation model (or cross-region inference profile) used for summaries
model_id = "anthropic.claude-3-haiku-20240307-v1:0"
model_region = "us-east-1"

# bedrock (default), anthropic or stub. The anthropic provider reads its
# API key from the named secure parameter.
# summarizer_provider = "anthropic"
# anthropic_api_key_parameter = "/summary-notifier/anthropic-api-key"

# Feeds and entries older than this many days are ignored
notification_lookback_days = 3

[summarizers.aws-solutions-architect-en]
output_language = "English"
persona = "solutions architect"

[notifiers.aws-blog]
summarizer_name = "aws-solutions-architect-en"
# v1 (default) or v2 (plain language for busy readers)
prompt_version = "v1"
# max_old_days = 7

# Unset fields default to "*"; with no schedule the crawl runs hourly
[notifiers.aws-blog.schedule]
minute = "0"
hour = "*/2"

[notifiers.aws-blog.rss_urls]
whats-new = "https://aws.amazon.com/about-aws/whats-new/recent/feed/"
blog = "https://aws.amazon.com/blogs/aws/feed/"

# type: slack, slackfree or teams
# delivery: URL (webhook URL in the parameter) or SNS (topic ARN in the parameter)
[[notifiers.aws-blog.destinations]]
type = "slack"
delivery = "URL"
parameter_name = "/notify/aws-blog/slack"

[stack]
description = "News feed summary and notification pipeline"
log_retention_days = 14
# alert_format: plain or chatbot
alert_format = "plain"
alert_emails = []
delivery_interval_ms = 500

[stack.artifacts]
bucket = "my-artifacts-bucket"
crawler_key = "crawler.zip"
notifier_key = "notifier.zip"
alerter_key = "alerter.zip"

[stack.crawler]
timeout_secs = 60
memory_mb = 256

[stack.notifier]
timeout_secs = 180
memory_mb = 256

[stack.alerter]
timeout_secs = 30
memory_mb = 128
"#
}
