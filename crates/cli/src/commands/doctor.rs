//! Doctor command - validate configuration and show status

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use summary_notifier_domain::{DeploymentConfig, SummarizerProvider};
use summary_notifier_domain::stack::inference_profile_base;

use crate::args::DoctorArgs;
use crate::config;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    validation: CheckResult,
    model: CheckResult,
    notifiers: CheckResult,
    parameters: CheckResult,
    artifacts: CheckResult,
    aws: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        validation: CheckResult::error("Not checked"),
        model: CheckResult::error("Not checked"),
        notifiers: CheckResult::error("Not checked"),
        parameters: CheckResult::error("Not checked"),
        artifacts: CheckResult::error("Not checked"),
        aws: check_aws_environment(),
        overall: "error".to_string(),
    };

    let config = match config::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.validation = match config.validate() {
            Ok(()) => CheckResult::ok("Configuration is consistent"),
            Err(e) => CheckResult::error(e.to_string()),
        };
        report.model = check_model(config);
        report.notifiers = check_notifiers(config);
        report.parameters = check_parameters(config);
        report.artifacts = check_artifacts(config);
    }

    let checks = [
        &report.config,
        &report.validation,
        &report.model,
        &report.notifiers,
        &report.parameters,
        &report.artifacts,
        &report.aws,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_model(config: &DeploymentConfig) -> CheckResult {
    if config.model_id.trim().is_empty() || config.model_region.trim().is_empty() {
        return CheckResult::error("model_id and model_region are required");
    }

    let provider = config.summarizer_provider;
    match provider {
        SummarizerProvider::Bedrock => {
            let kind = match inference_profile_base(&config.model_id) {
                Some(_) => "inference profile",
                None => "foundation model",
            };
            CheckResult::ok(format!(
                "Model: {} ({}), Region: {}",
                config.model_id, kind, config.model_region
            ))
        }
        SummarizerProvider::Anthropic => match config.api_key_parameter() {
            Some(parameter) => CheckResult::ok(format!(
                "Model: {} via Messages API, key in {}",
                config.model_id, parameter
            )),
            None => CheckResult::error("anthropic_api_key_parameter is required"),
        },
        SummarizerProvider::Stub => {
            CheckResult::warn("Stub provider: summaries echo the article title")
        }
    }
    .with_details(json!({"provider": provider.as_str()}))
}

fn check_notifiers(config: &DeploymentConfig) -> CheckResult {
    if config.notifiers.is_empty() {
        return CheckResult::error("No notifiers configured");
    }

    let details: serde_json::Map<String, serde_json::Value> = config
        .notifiers
        .iter()
        .map(|(name, notifier)| {
            (
                name.clone(),
                json!({
                    "schedule": notifier.schedule.expression(),
                    "feeds": notifier.rss_urls.len(),
                    "destinations": notifier
                        .destinations
                        .iter()
                        .map(|d| d.kind())
                        .collect::<Vec<_>>(),
                    "summarizer": notifier.summarizer_name,
                    "lookback_days": config.lookback_days_for(notifier),
                }),
            )
        })
        .collect();

    CheckResult::ok(format!("{} notifiers configured", config.notifiers.len()))
        .with_details(serde_json::Value::Object(details))
}

fn check_parameters(config: &DeploymentConfig) -> CheckResult {
    let names = config.referenced_parameters();
    if names.is_empty() {
        return CheckResult::error("No destination parameters referenced");
    }

    CheckResult::ok(format!(
        "{} parameters referenced (existence is checked by synth)",
        names.len()
    ))
    .with_details(json!(names))
}

fn check_artifacts(config: &DeploymentConfig) -> CheckResult {
    let artifacts = &config.stack.artifacts;
    if artifacts.bucket.trim().is_empty() {
        return CheckResult::error("stack.artifacts.bucket is not set");
    }

    CheckResult::ok(format!("Bundles in s3://{}", artifacts.bucket)).with_details(json!({
        "crawler": artifacts.crawler_key,
        "notifier": artifacts.notifier_key,
        "alerter": artifacts.alerter_key,
    }))
}

fn check_aws_environment() -> CheckResult {
    let set = |name: &str| std::env::var(name).is_ok_and(|v| !v.is_empty());

    let region = ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .into_iter()
        .find(|name| set(*name));
    let profile = set("AWS_PROFILE");

    match (region, profile) {
        (Some(name), _) => CheckResult::ok(format!("Region from {}", name)),
        (None, true) => CheckResult::ok("Region from AWS_PROFILE"),
        (None, false) => CheckResult::warn(
            "No AWS region or profile in environment; synth uses the default provider chain",
        ),
    }
}

fn print_report(report: &DoctorReport) {
    println!("summary-notifier Doctor Report");
    println!("==============================");
    println!();

    print_check("Config", &report.config);
    print_check("Validation", &report.validation);
    print_check("Model", &report.model);
    print_check("Notifiers", &report.notifiers);
    print_check("Parameters", &report.parameters);
    print_check("Artifacts", &report.artifacts);
    print_check("AWS", &report.aws);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall != "error" {
        println!();
        println!("Next: summary-notifier synth --out template.json");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
