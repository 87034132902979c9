//! Domain models and value objects

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::{NotifierConfig, PromptVersion};

/// Payload a schedule rule delivers to the crawler job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    /// Name of the notifier to crawl for
    pub notifier_name: String,
    /// Full notifier configuration
    pub notifier: NotifierConfig,
}

/// A parsed feed document
#[derive(Debug, Clone, Default)]
pub struct Feed {
    /// Last build date of the channel, falling back to its publication date
    pub updated: Option<OffsetDateTime>,
    /// Entries in document order
    pub entries: Vec<FeedEntry>,
}

/// A single entry of a feed
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<OffsetDateTime>,
    /// Raw category tags; a single tag may hold a comma separated list
    pub categories: Vec<String>,
}

/// Identity of a row in the feed and history tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub url: String,
    pub notifier_name: String,
}

/// A row of the source feed table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Link of the entry (key component 1)
    pub url: String,
    /// Notifier that discovered the entry (key component 2)
    pub notifier_name: String,
    pub title: String,
    /// Label of the feed within the notifier
    pub category: String,
    /// Publication time of the entry
    #[serde(with = "time::serde::rfc3339")]
    pub pubtime: OffsetDateTime,
    /// When the crawler wrote the row
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marketing_architectures: Vec<String>,
}

impl FeedItem {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            url: self.url.clone(),
            notifier_name: self.notifier_name.clone(),
        }
    }
}

/// A row of the notification history table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub url: String,
    pub notifier_name: String,
    pub title: String,
    pub summary: String,
    pub detail: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl NotificationRecord {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            url: self.url.clone(),
            notifier_name: self.notifier_name.clone(),
        }
    }
}

/// Outcome of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The row did not exist and was written
    Inserted,
    /// A row with the same key already existed; nothing was written
    Duplicate,
}

/// Input to a summarizer
#[derive(Debug, Clone)]
pub struct SummaryInput {
    pub title: String,
    /// Plain text of the article body
    pub article_text: String,
    pub persona: String,
    pub output_language: String,
    pub prompt_version: PromptVersion,
}

/// Result of summarizing an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// One or two sentence summary
    pub summary: String,
    /// Bullet point detail, one `- ` line per point
    pub detail: String,
}

/// Kind of change carried by a table stream record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
}

impl ChangeKind {
    /// Parse a stream `eventName`
    pub fn parse(event_name: &str) -> Option<Self> {
        match event_name {
            "INSERT" => Some(Self::Insert),
            "MODIFY" => Some(Self::Modify),
            "REMOVE" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// A change record from the feed table stream
#[derive(Debug, Clone)]
pub struct FeedChange {
    pub kind: ChangeKind,
    /// New image of the row; absent for removals
    pub item: Option<FeedItem>,
}

/// A batch of log lines delivered by a log subscription
#[derive(Debug, Clone, Default)]
pub struct LogBatch {
    pub log_group: String,
    pub log_stream: String,
    pub events: Vec<LogLine>,
}

/// A single log line
#[derive(Debug, Clone)]
pub struct LogLine {
    pub id: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub message: String,
}
