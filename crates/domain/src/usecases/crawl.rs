//! Crawl use case - discovers recent feed entries and records them

use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::{
    config::NotifierConfig,
    model::{FeedEntry, FeedItem, PutOutcome},
    ports::{Clock, FeedItemStore, FeedSource},
};

const SERVICE_PREFIX: &str = "general:products/";
const ARCHITECTURE_PREFIX: &str = "marketing:marchitecture/";

/// Counts from one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// New rows written
    pub inserted: usize,
    /// Entries already present in the table
    pub duplicate: usize,
    /// Entries outside the look-back window or without a date
    pub stale: usize,
    /// Feeds not updated within the look-back window
    pub skipped_feeds: usize,
    /// Feeds that could not be fetched plus rows that could not be written
    pub failed: usize,
}

/// Crawls the feeds of one notifier into the feed table
pub struct CrawlUseCase<F, S, C>
where
    F: FeedSource + ?Sized,
    S: FeedItemStore + ?Sized,
    C: Clock + ?Sized,
{
    feeds: Arc<F>,
    store: Arc<S>,
    clock: Arc<C>,
}

impl<F, S, C> CrawlUseCase<F, S, C>
where
    F: FeedSource + ?Sized,
    S: FeedItemStore + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(feeds: Arc<F>, store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            feeds,
            store,
            clock,
        }
    }

    /// Crawl every feed of `notifier`.
    ///
    /// `default_lookback_days` applies unless the notifier sets its own
    /// `max_old_days`. A feed that fails is logged and skipped.
    pub async fn crawl(
        &self,
        notifier_name: &str,
        notifier: &NotifierConfig,
        default_lookback_days: u32,
    ) -> CrawlReport {
        let lookback_days = notifier.max_old_days.unwrap_or(default_lookback_days);
        let now = self.clock.now();
        let mut report = CrawlReport::default();

        // rss_urls is ordered by label
        for (label, url) in &notifier.rss_urls {
            let feed = match self.feeds.fetch(url).await {
                Ok(feed) => feed,
                Err(e) => {
                    tracing::error!(notifier = %notifier_name, feed = %label, url = %url, error = %e, "Failed to fetch feed");
                    report.failed += 1;
                    continue;
                }
            };

            if let Some(updated) = feed.updated {
                if !within_window(now, updated, lookback_days) {
                    tracing::info!(notifier = %notifier_name, feed = %label, updated = %updated, "Feed not updated recently, skipping");
                    report.skipped_feeds += 1;
                    continue;
                }
            }

            tracing::info!(notifier = %notifier_name, feed = %label, entries = feed.entries.len(), "Fetched feed");

            for entry in &feed.entries {
                let Some(published) = entry.published.filter(|p| within_window(now, *p, lookback_days)) else {
                    tracing::debug!(title = %entry.title, "Old or undated entry, skipping");
                    report.stale += 1;
                    continue;
                };

                let item = build_item(entry, published, label, notifier_name, now);
                match self.store.put_if_absent(&item).await {
                    Ok(PutOutcome::Inserted) => {
                        tracing::info!(url = %item.url, title = %item.title, "Recorded feed item");
                        report.inserted += 1;
                    }
                    Ok(PutOutcome::Duplicate) => {
                        tracing::debug!(url = %item.url, "Feed item already recorded");
                        report.duplicate += 1;
                    }
                    Err(e) => {
                        tracing::error!(url = %item.url, error = %e, "Failed to record feed item");
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            notifier = %notifier_name,
            inserted = report.inserted,
            duplicate = report.duplicate,
            stale = report.stale,
            skipped_feeds = report.skipped_feeds,
            failed = report.failed,
            "Crawl complete"
        );

        report
    }
}

/// Whether `timestamp` is at most `days` whole days before `now`. An entry
/// 3 days and 20 hours old is inside a 3 day window.
pub fn within_window(now: OffsetDateTime, timestamp: OffsetDateTime, days: u32) -> bool {
    (now - timestamp).whole_days() <= i64::from(days)
}

fn build_item(
    entry: &FeedEntry,
    published: OffsetDateTime,
    label: &str,
    notifier_name: &str,
    now: OffsetDateTime,
) -> FeedItem {
    let (service_categories, marketing_architectures) = split_categories(&entry.categories);
    FeedItem {
        url: entry.link.clone(),
        notifier_name: notifier_name.to_string(),
        title: entry.title.clone(),
        category: label.to_string(),
        pubtime: published,
        created_at: now,
        service_categories,
        marketing_architectures,
    }
}

/// Map category tags to service names and architecture names.
///
/// A tag may itself hold a comma separated list, e.g.
/// `general:products/amazon-rds,marketing:marchitecture/databases`.
pub fn split_categories(tags: &[String]) -> (Vec<String>, Vec<String>) {
    let mut services = Vec::new();
    let mut architectures = Vec::new();

    for tag in tags.iter().flat_map(|t| t.split(',')).map(str::trim) {
        if let Some(rest) = tag.strip_prefix(SERVICE_PREFIX) {
            push_segment(&mut services, rest);
        } else if let Some(rest) = tag.strip_prefix(ARCHITECTURE_PREFIX) {
            push_segment(&mut architectures, rest);
        }
    }

    (services, architectures)
}

fn push_segment(target: &mut Vec<String>, rest: &str) {
    let segment = rest.split('/').next().unwrap_or_default();
    if !segment.is_empty() {
        target.push(segment.to_string());
    }
}
