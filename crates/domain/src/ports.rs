//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::BTreeMap;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{Feed, FeedItem, ItemKey, NotificationRecord, PutOutcome, Summary, SummaryInput};

/// Error type for feed source operations
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Port for downloading and parsing syndication feeds
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError>;
}

/// Error type for table store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the source feed table
#[async_trait]
pub trait FeedItemStore: Send + Sync {
    /// Write the item unless a row with the same key exists
    async fn put_if_absent(&self, item: &FeedItem) -> Result<PutOutcome, StoreError>;
}

/// Port for the notification history table
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Check whether a notification was already recorded
    async fn contains(&self, key: &ItemKey) -> Result<bool, StoreError>;

    /// Record a completed notification
    async fn record(&self, record: &NotificationRecord) -> Result<(), StoreError>;
}

/// Error type for article retrieval
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
}

/// Port for retrieving the readable text of an article
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Fetch the page and return the text of its main content, if it has one
    async fn fetch_text(&self, url: &str) -> Result<Option<String>, FetchError>;
}

/// Error type for summarizer operations
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Port for LLM-based summarization
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize an article for the configured persona
    async fn summarize(&self, input: SummaryInput) -> Result<Summary, SummarizeError>;

    /// Provider name for logging (e.g., "bedrock")
    fn provider(&self) -> &'static str;
}

/// Error type for secret lookups
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Parameter not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("API error: {0}")]
    Api(String),
}

/// Port for reading secure parameters (webhook URLs, topic ARNs)
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read and decrypt a parameter
    async fn get(&self, name: &str) -> Result<SecretString, SecretError>;
}

/// Error type for message delivery
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("API error: {0}")]
    Api(String),
}

/// Port for posting a JSON document to a webhook
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn post_json(
        &self,
        url: &SecretString,
        body: &serde_json::Value,
    ) -> Result<(), DeliveryError>;
}

/// Typed value of a message attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    /// Decimal number carried as text
    Number(String),
}

/// A message for a pub/sub topic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicMessage {
    pub subject: Option<String>,
    pub body: String,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl TopicMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }
}

/// Port for publishing to a pub/sub topic
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, topic_arn: &str, message: &TopicMessage) -> Result<(), DeliveryError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
