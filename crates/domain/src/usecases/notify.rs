//! Notify use case - summarizes newly inserted feed items and delivers them

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::{Channel, Destination, NotifierConfig, SummarizerConfig},
    model::{ChangeKind, FeedChange, FeedItem, NotificationRecord, Summary, SummaryInput},
    ports::{
        ArticleFetcher, Clock, DeliveryError, HistoryStore, SecretStore, Summarizer,
        TopicMessage, TopicPublisher, WebhookSender,
    },
    usecases::render::{NotificationItem, render_message},
};
use secrecy::ExposeSecret;

/// Configuration for the notifier
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub notifiers: BTreeMap<String, NotifierConfig>,
    pub summarizers: BTreeMap<String, SummarizerConfig>,
    /// Pause after each delivery
    pub delivery_interval: Duration,
}

/// Result of handling one change record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotifyOutcome {
    Notified { delivered: usize, failed: usize },
    Skipped { reason: String },
    Failed { error: String },
}

/// Errors raised while delivering to one destination
#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("Secret lookup failed: {0}")]
    Secret(#[from] crate::ports::SecretError),
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Notification orchestrator
pub struct NotifyUseCase<H, A, S, K, W, T, C>
where
    H: HistoryStore + ?Sized,
    A: ArticleFetcher + ?Sized,
    S: Summarizer + ?Sized,
    K: SecretStore + ?Sized,
    W: WebhookSender + ?Sized,
    T: TopicPublisher + ?Sized,
    C: Clock + ?Sized,
{
    history: Arc<H>,
    articles: Arc<A>,
    summarizer: Arc<S>,
    secrets: Arc<K>,
    webhooks: Arc<W>,
    topics: Arc<T>,
    clock: Arc<C>,
    config: NotifyConfig,
}

impl<H, A, S, K, W, T, C> NotifyUseCase<H, A, S, K, W, T, C>
where
    H: HistoryStore + ?Sized,
    A: ArticleFetcher + ?Sized,
    S: Summarizer + ?Sized,
    K: SecretStore + ?Sized,
    W: WebhookSender + ?Sized,
    T: TopicPublisher + ?Sized,
    C: Clock + ?Sized,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        history: Arc<H>,
        articles: Arc<A>,
        summarizer: Arc<S>,
        secrets: Arc<K>,
        webhooks: Arc<W>,
        topics: Arc<T>,
        clock: Arc<C>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            history,
            articles,
            summarizer,
            secrets,
            webhooks,
            topics,
            clock,
            config,
        }
    }

    /// Handle a batch of change records, one outcome per record
    pub async fn handle(&self, changes: &[FeedChange]) -> Vec<NotifyOutcome> {
        let mut outcomes = Vec::with_capacity(changes.len());
        for change in changes {
            outcomes.push(self.handle_change(change).await);
        }
        outcomes
    }

    async fn handle_change(&self, change: &FeedChange) -> NotifyOutcome {
        if change.kind != ChangeKind::Insert {
            tracing::debug!(kind = ?change.kind, "Skipping non-insert change");
            return NotifyOutcome::Skipped {
                reason: "Not an insert".to_string(),
            };
        }

        let Some(item) = &change.item else {
            tracing::warn!("Insert change without a new image");
            return NotifyOutcome::Skipped {
                reason: "No item image".to_string(),
            };
        };

        let Some(notifier) = self.config.notifiers.get(&item.notifier_name) else {
            tracing::error!(notifier = %item.notifier_name, url = %item.url, "Unknown notifier");
            return NotifyOutcome::Skipped {
                reason: format!("Unknown notifier '{}'", item.notifier_name),
            };
        };

        match self.history.contains(&item.key()).await {
            Ok(true) => {
                tracing::info!(url = %item.url, notifier = %item.notifier_name, "Already notified");
                return NotifyOutcome::Skipped {
                    reason: "Already notified".to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to check notification history, continuing");
            }
            Ok(false) => {}
        }

        let summary = match self.summarize(item, notifier).await {
            Ok(summary) => summary,
            Err(error) => {
                tracing::error!(url = %item.url, error = %error, "Failed to summarize item");
                return NotifyOutcome::Failed { error };
            }
        };

        let message_item = NotificationItem::new(item, &summary);
        let mut delivered = 0;
        let mut failed = 0;

        for destination in &notifier.destinations {
            match self.deliver(destination, &message_item).await {
                Ok(()) => {
                    tracing::info!(
                        url = %item.url,
                        destination = destination.kind(),
                        parameter = destination.parameter_name(),
                        "Delivered notification"
                    );
                    delivered += 1;
                }
                Err(e) => {
                    tracing::error!(
                        url = %item.url,
                        destination = destination.kind(),
                        parameter = destination.parameter_name(),
                        error = %e,
                        "Failed to deliver notification"
                    );
                    failed += 1;
                }
            }

            if !self.config.delivery_interval.is_zero() {
                tokio::time::sleep(self.config.delivery_interval).await;
            }
        }

        let record = NotificationRecord {
            url: item.url.clone(),
            notifier_name: item.notifier_name.clone(),
            title: item.title.clone(),
            summary: summary.summary,
            detail: summary.detail,
            created_at: self.clock.now(),
        };
        if let Err(e) = self.history.record(&record).await {
            tracing::error!(url = %item.url, error = %e, "Failed to record notification history");
        }

        NotifyOutcome::Notified { delivered, failed }
    }

    async fn summarize(&self, item: &FeedItem, notifier: &NotifierConfig) -> Result<Summary, String> {
        let summarizer = self
            .config
            .summarizers
            .get(&notifier.summarizer_name)
            .ok_or_else(|| format!("Unknown summarizer '{}'", notifier.summarizer_name))?;

        let article_text = match self.articles.fetch_text(&item.url).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::warn!(url = %item.url, "Article has no main content, summarizing title");
                item.title.clone()
            }
            Err(e) => {
                tracing::warn!(url = %item.url, error = %e, "Failed to fetch article, summarizing title");
                item.title.clone()
            }
        };

        let input = SummaryInput {
            title: item.title.clone(),
            article_text,
            persona: summarizer.persona.clone(),
            output_language: summarizer.output_language.clone(),
            prompt_version: notifier.prompt_version,
        };

        let summary = self
            .summarizer
            .summarize(input)
            .await
            .map_err(|e| format!("Summarization failed: {}", e))?;

        tracing::info!(url = %item.url, provider = self.summarizer.provider(), "Summarized item");
        Ok(summary)
    }

    async fn deliver(
        &self,
        destination: &Destination,
        item: &NotificationItem,
    ) -> Result<(), DestinationError> {
        let body = render_message(destination, item);
        let target = self.secrets.get(destination.parameter_name()).await?;

        match destination.channel() {
            Channel::Webhook { .. } => self.webhooks.post_json(&target, &body).await?,
            Channel::Topic { .. } => {
                let message = TopicMessage::new(body.to_string());
                self.topics
                    .publish(target.expose_secret(), &message)
                    .await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptVersion;
    use crate::model::ItemKey;
    use crate::ports::{FetchError, FixedClock, SecretError, StoreError, SummarizeError};
    use crate::schedule::CronSchedule;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;

    #[derive(Default)]
    struct FakeHistory {
        keys: Mutex<HashSet<ItemKey>>,
        records: Mutex<Vec<NotificationRecord>>,
    }

    #[async_trait]
    impl HistoryStore for FakeHistory {
        async fn contains(&self, key: &ItemKey) -> Result<bool, StoreError> {
            Ok(self.keys.lock().unwrap().contains(key))
        }

        async fn record(&self, record: &NotificationRecord) -> Result<(), StoreError> {
            self.keys.lock().unwrap().insert(record.key());
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct FakeArticles;

    #[async_trait]
    impl ArticleFetcher for FakeArticles {
        async fn fetch_text(&self, url: &str) -> Result<Option<String>, FetchError> {
            if url.contains("missing") {
                return Err(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                });
            }
            Ok(Some(format!("Body of {}", url)))
        }
    }

    #[derive(Default)]
    struct FakeSummarizer {
        inputs: Mutex<Vec<SummaryInput>>,
        fail: bool,
    }

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize(&self, input: SummaryInput) -> Result<Summary, SummarizeError> {
            self.inputs.lock().unwrap().push(input);
            if self.fail {
                return Err(SummarizeError::Timeout);
            }
            Ok(Summary {
                summary: "Short summary".to_string(),
                detail: "- point".to_string(),
            })
        }

        fn provider(&self) -> &'static str {
            "fake"
        }
    }

    struct FakeSecrets {
        values: HashMap<String, String>,
    }

    #[async_trait]
    impl SecretStore for FakeSecrets {
        async fn get(&self, name: &str) -> Result<SecretString, SecretError> {
            self.values
                .get(name)
                .map(|v| SecretString::from(v.clone()))
                .ok_or_else(|| SecretError::NotFound(name.to_string()))
        }
    }

    #[derive(Default)]
    struct FakeWebhooks {
        posts: Mutex<Vec<(String, serde_json::Value)>>,
    }

    #[async_trait]
    impl WebhookSender for FakeWebhooks {
        async fn post_json(
            &self,
            url: &SecretString,
            body: &serde_json::Value,
        ) -> Result<(), DeliveryError> {
            let url = url.expose_secret().to_string();
            if url.contains("broken") {
                return Err(DeliveryError::Status {
                    status: 500,
                    body: "oops".to_string(),
                });
            }
            self.posts.lock().unwrap().push((url, body.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTopics {
        published: AtomicUsize,
    }

    #[async_trait]
    impl TopicPublisher for FakeTopics {
        async fn publish(&self, _topic_arn: &str, _message: &TopicMessage) -> Result<(), DeliveryError> {
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    type TestUseCase = NotifyUseCase<
        FakeHistory,
        FakeArticles,
        FakeSummarizer,
        FakeSecrets,
        FakeWebhooks,
        FakeTopics,
        FixedClock,
    >;

    struct Harness {
        usecase: TestUseCase,
        history: Arc<FakeHistory>,
        summarizer: Arc<FakeSummarizer>,
        webhooks: Arc<FakeWebhooks>,
        topics: Arc<FakeTopics>,
    }

    fn destination(kind: &str, parameter: &str) -> Destination {
        let channel = if kind == "topic" {
            Channel::Topic {
                parameter_name: parameter.to_string(),
            }
        } else {
            Channel::Webhook {
                parameter_name: parameter.to_string(),
            }
        };
        match kind {
            "teams" => Destination::Teams { channel },
            "slackfree" => Destination::SlackBlocks { channel },
            _ => Destination::Slack { channel },
        }
    }

    fn harness(destinations: Vec<Destination>, summarizer: FakeSummarizer) -> Harness {
        let notifier = NotifierConfig {
            schedule: CronSchedule::hourly(),
            summarizer_name: "architect".to_string(),
            rss_urls: BTreeMap::from([("News".to_string(), "https://example.com/feed".to_string())]),
            destinations,
            prompt_version: PromptVersion::V2,
            max_old_days: None,
        };
        let config = NotifyConfig {
            notifiers: BTreeMap::from([("aws-blog".to_string(), notifier)]),
            summarizers: BTreeMap::from([(
                "architect".to_string(),
                SummarizerConfig {
                    output_language: "English.".to_string(),
                    persona: "solutions architect".to_string(),
                },
            )]),
            delivery_interval: Duration::ZERO,
        };

        let history = Arc::new(FakeHistory::default());
        let summarizer = Arc::new(summarizer);
        let webhooks = Arc::new(FakeWebhooks::default());
        let topics = Arc::new(FakeTopics::default());
        let secrets = Arc::new(FakeSecrets {
            values: HashMap::from([
                ("/hook/slack".to_string(), "https://hooks.example.com/slack".to_string()),
                ("/hook/teams".to_string(), "https://hooks.example.com/teams".to_string()),
                ("/hook/broken".to_string(), "https://hooks.example.com/broken".to_string()),
                ("/topic".to_string(), "arn:aws:sns:us-east-1:123:topic".to_string()),
            ]),
        });

        let usecase = NotifyUseCase::new(
            history.clone(),
            Arc::new(FakeArticles),
            summarizer.clone(),
            secrets,
            webhooks.clone(),
            topics.clone(),
            Arc::new(FixedClock(datetime!(2024-06-10 12:00 UTC))),
            config,
        );

        Harness {
            usecase,
            history,
            summarizer,
            webhooks,
            topics,
        }
    }

    fn insert(url: &str, notifier: &str) -> FeedChange {
        FeedChange {
            kind: ChangeKind::Insert,
            item: Some(FeedItem {
                url: url.to_string(),
                notifier_name: notifier.to_string(),
                title: "Title".to_string(),
                category: "News".to_string(),
                pubtime: datetime!(2024-06-10 09:00 UTC),
                created_at: datetime!(2024-06-10 10:00 UTC),
                service_categories: vec![],
                marketing_architectures: vec![],
            }),
        }
    }

    #[tokio::test]
    async fn test_insert_is_summarized_delivered_and_recorded() {
        let h = harness(
            vec![destination("slack", "/hook/slack"), destination("teams", "/hook/teams")],
            FakeSummarizer::default(),
        );

        let outcomes = h.usecase.handle(&[insert("https://example.com/a", "aws-blog")]).await;

        assert_eq!(
            outcomes,
            vec![NotifyOutcome::Notified {
                delivered: 2,
                failed: 0
            }]
        );

        let inputs = h.summarizer.inputs.lock().unwrap();
        assert_eq!(inputs[0].article_text, "Body of https://example.com/a");
        assert_eq!(inputs[0].persona, "solutions architect");
        assert_eq!(inputs[0].prompt_version, PromptVersion::V2);

        let posts = h.webhooks.posts.lock().unwrap();
        assert_eq!(posts[0].0, "https://hooks.example.com/slack");
        assert_eq!(posts[0].1["summary"], "Short summary");
        assert_eq!(posts[1].1["type"], "message");

        let records = h.history.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "Short summary");
    }

    #[tokio::test]
    async fn test_non_insert_changes_skipped() {
        let h = harness(vec![destination("slack", "/hook/slack")], FakeSummarizer::default());
        let mut change = insert("https://example.com/a", "aws-blog");
        change.kind = ChangeKind::Modify;

        let outcomes = h.usecase.handle(&[change]).await;

        assert!(matches!(outcomes[0], NotifyOutcome::Skipped { .. }));
        assert!(h.summarizer.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_already_notified_item_skipped() {
        let h = harness(vec![destination("slack", "/hook/slack")], FakeSummarizer::default());
        let change = insert("https://example.com/a", "aws-blog");

        h.usecase.handle(&[change.clone()]).await;
        let outcomes = h.usecase.handle(&[change]).await;

        assert_eq!(
            outcomes,
            vec![NotifyOutcome::Skipped {
                reason: "Already notified".to_string()
            }]
        );
        assert_eq!(h.webhooks.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_notifier_skipped() {
        let h = harness(vec![destination("slack", "/hook/slack")], FakeSummarizer::default());

        let outcomes = h.usecase.handle(&[insert("https://example.com/a", "ghost")]).await;

        assert!(matches!(outcomes[0], NotifyOutcome::Skipped { .. }));
        assert!(h.history.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_destination_does_not_stop_others() {
        let h = harness(
            vec![
                destination("slack", "/hook/broken"),
                destination("slack", "/hook/unknown-parameter"),
                destination("topic", "/topic"),
                destination("slackfree", "/hook/slack"),
            ],
            FakeSummarizer::default(),
        );

        let outcomes = h.usecase.handle(&[insert("https://example.com/a", "aws-blog")]).await;

        assert_eq!(
            outcomes,
            vec![NotifyOutcome::Notified {
                delivered: 2,
                failed: 2
            }]
        );
        assert_eq!(h.topics.published.load(Ordering::SeqCst), 1);
        assert_eq!(h.webhooks.posts.lock().unwrap().len(), 1);
        assert_eq!(h.history.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_article_falls_back_to_title() {
        let h = harness(vec![destination("slack", "/hook/slack")], FakeSummarizer::default());

        h.usecase
            .handle(&[insert("https://example.com/missing", "aws-blog")])
            .await;

        assert_eq!(h.summarizer.inputs.lock().unwrap()[0].article_text, "Title");
    }

    #[tokio::test]
    async fn test_summarizer_failure_delivers_nothing() {
        let h = harness(
            vec![destination("slack", "/hook/slack")],
            FakeSummarizer {
                fail: true,
                ..Default::default()
            },
        );

        let outcomes = h.usecase.handle(&[insert("https://example.com/a", "aws-blog")]).await;

        assert!(matches!(outcomes[0], NotifyOutcome::Failed { .. }));
        assert!(h.webhooks.posts.lock().unwrap().is_empty());
        assert!(h.history.records.lock().unwrap().is_empty());
    }
}
