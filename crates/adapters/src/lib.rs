//! summary-notifier adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `feeds`: RSS feed source and article text fetcher
//! - `llm`: Summarizer providers (Bedrock, Anthropic, stub)
//! - `store`: DynamoDB feed/history tables and an in-memory feed table
//! - `secrets`: SSM parameter store
//! - `delivery`: Webhook and SNS delivery

mod article;
mod feed_rss;
mod secrets_ssm;
mod sns;
mod store_dynamo;
mod store_memory;
mod webhook;

pub mod llm;

/// Re-exports for feed adapters
pub mod feeds {
    pub use crate::article::{HttpArticleFetcher, extract_main_text};
    pub use crate::feed_rss::{RssFeedSource, parse_feed};
}

/// Re-exports for table adapters
pub mod store {
    pub use crate::store_dynamo::{DynamoFeedStore, DynamoHistoryStore};
    pub use crate::store_memory::InMemoryFeedStore;
}

/// Re-exports for secret adapters
pub mod secrets {
    pub use crate::secrets_ssm::SsmSecretStore;
}

/// Re-exports for delivery adapters
pub mod delivery {
    pub use crate::sns::SnsTopicPublisher;
    pub use crate::webhook::HttpWebhookSender;
}

/// Shared user agent for outbound HTTP
pub const USER_AGENT: &str = concat!("summary-notifier/", env!("CARGO_PKG_VERSION"));
