//! Alert use case - republishes error log lines to the alert topic

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::{
    config::AlertFormat,
    model::{LogBatch, LogLine},
    ports::{AttributeValue, TopicMessage, TopicPublisher},
};

/// Topic subjects longer than this are rejected by SNS
const MAX_SUBJECT_CHARS: usize = 100;

/// Severity level detected on a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Fatal,
    Other,
}

impl LogLevel {
    /// Determine the level of a raw log line.
    ///
    /// Structured lines report their `level` field; anything else is
    /// scanned for the `ERROR` and `FATAL` markers.
    pub fn detect(message: &str) -> Self {
        if let Ok(serde_json::Value::Object(fields)) =
            serde_json::from_str::<serde_json::Value>(message.trim())
        {
            if let Some(level) = fields.get("level").and_then(|v| v.as_str()) {
                return match level.to_ascii_uppercase().as_str() {
                    "ERROR" => LogLevel::Error,
                    "FATAL" | "CRITICAL" => LogLevel::Fatal,
                    _ => LogLevel::Other,
                };
            }
        }

        if message.contains("ERROR") {
            LogLevel::Error
        } else if message.contains("FATAL") {
            LogLevel::Fatal
        } else {
            LogLevel::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
            LogLevel::Other => "INFO",
        }
    }

    pub fn severity(&self) -> &'static str {
        match self {
            LogLevel::Error => "HIGH",
            LogLevel::Fatal => "CRITICAL",
            LogLevel::Other => "MEDIUM",
        }
    }
}

/// Counts from one forwarded batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertReport {
    pub published: usize,
    pub ignored: usize,
    pub failed: usize,
}

/// Forwards error and fatal log lines to a topic
pub struct AlertUseCase<P: TopicPublisher + ?Sized> {
    publisher: Arc<P>,
    topic_arn: String,
    format: AlertFormat,
}

impl<P: TopicPublisher + ?Sized> AlertUseCase<P> {
    pub fn new(publisher: Arc<P>, topic_arn: impl Into<String>, format: AlertFormat) -> Self {
        Self {
            publisher,
            topic_arn: topic_arn.into(),
            format,
        }
    }

    /// Publish one message per error or fatal line of the batch
    pub async fn forward(&self, batch: &LogBatch) -> AlertReport {
        let mut report = AlertReport::default();

        if batch.events.is_empty() {
            tracing::info!(log_group = %batch.log_group, "No log events in batch");
            return report;
        }

        for line in &batch.events {
            let level = LogLevel::detect(&line.message);
            if level == LogLevel::Other {
                report.ignored += 1;
                continue;
            }

            let message = match self.format {
                AlertFormat::Plain => plain_message(batch, line, level),
                AlertFormat::Chatbot => chatbot_message(batch, line, level),
            };

            match self.publisher.publish(&self.topic_arn, &message).await {
                Ok(()) => {
                    tracing::debug!(event_id = %line.id, level = level.as_str(), "Published alert");
                    report.published += 1;
                }
                Err(e) => {
                    tracing::error!(event_id = %line.id, error = %e, "Failed to publish alert");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            log_group = %batch.log_group,
            published = report.published,
            ignored = report.ignored,
            failed = report.failed,
            "Forwarded log batch"
        );

        report
    }
}

fn subject(text: String) -> String {
    if text.chars().count() <= MAX_SUBJECT_CHARS {
        return text;
    }
    text.chars().take(MAX_SUBJECT_CHARS).collect()
}

fn plain_message(batch: &LogBatch, line: &LogLine, level: LogLevel) -> TopicMessage {
    let mut message = TopicMessage::new(line.message.clone());
    message.subject = Some(subject(format!(
        "{} detected: {}",
        level.as_str(),
        batch.log_group
    )));

    let attributes = [
        ("level", AttributeValue::String(level.as_str().to_string())),
        ("severity", AttributeValue::String(level.severity().to_string())),
        ("logGroup", AttributeValue::String(batch.log_group.clone())),
        ("logStream", AttributeValue::String(batch.log_stream.clone())),
        ("eventSourceId", AttributeValue::String(line.id.clone())),
        ("eventTime", AttributeValue::Number(line.timestamp.to_string())),
    ];
    message.attributes = attributes
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    message
}

fn chatbot_message(batch: &LogBatch, line: &LogLine, level: LogLevel) -> TopicMessage {
    let group = &batch.log_group;
    let document = json!({
        "version": "1.0",
        "source": "custom",
        "id": format!("{}-{}", group, line.timestamp),
        "content": {
            "textType": "client-markdown",
            "title": format!(":warning: {}: {}", level.as_str(), group),
            "description": format!("```\n{}\n```", line.message),
            "nextSteps": [
                format!("Log Group: `{}`", group),
                format!("Log Stream: `{}`", batch.log_stream),
            ],
            "keywords": [level.as_str(), "CloudWatch", "LogError"],
        },
        "metadata": {
            "threadId": format!("logs-{}", group),
            "summary": format!("{} detected in {}", level.as_str(), group),
            "eventType": "CloudWatchLogError",
            "additionalContext": {"severity": level.severity()},
        },
    });

    let mut message = TopicMessage::new(document.to_string());
    message.subject = Some(subject(format!("{}: {}", level.as_str(), group)));
    message
}
