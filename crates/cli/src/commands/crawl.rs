//! Crawl command - run one notifier's crawl against an in-memory table

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use summary_notifier_adapters::feeds::RssFeedSource;
use summary_notifier_adapters::store::InMemoryFeedStore;
use summary_notifier_domain::usecases::{CrawlReport, CrawlUseCase};
use summary_notifier_domain::{FeedItem, SystemClock};
use time::format_description::well_known::Rfc3339;

use crate::args::CrawlArgs;
use crate::config;

const FEED_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CrawlOutput {
    notifier: String,
    report: CrawlReport,
    items: Vec<FeedItem>,
}

pub async fn execute(args: CrawlArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = config::load(config_path.as_deref())?;

    let Some(notifier) = config.notifiers.get(&args.notifier) else {
        let known: Vec<&str> = config.notifiers.keys().map(String::as_str).collect();
        anyhow::bail!(
            "Unknown notifier '{}'. Configured notifiers: {}",
            args.notifier,
            if known.is_empty() {
                "(none)".to_string()
            } else {
                known.join(", ")
            }
        );
    };

    let store = Arc::new(InMemoryFeedStore::new());
    let usecase = CrawlUseCase::new(
        Arc::new(RssFeedSource::new(FEED_TIMEOUT)?),
        store.clone(),
        Arc::new(SystemClock),
    );

    let report = usecase
        .crawl(&args.notifier, notifier, config.notification_lookback_days)
        .await;
    let items = store.items().context("Failed to read crawled items")?;

    let output = CrawlOutput {
        notifier: args.notifier,
        report,
        items,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_output(&output);
    }

    Ok(())
}

fn print_output(output: &CrawlOutput) {
    let report = &output.report;
    println!("Crawl of '{}'", output.notifier);
    println!(
        "  new: {}, duplicate: {}, stale: {}, skipped feeds: {}, failed: {}",
        report.inserted, report.duplicate, report.stale, report.skipped_feeds, report.failed
    );

    if output.items.is_empty() {
        return;
    }

    println!();
    for item in &output.items {
        let published = item
            .pubtime
            .format(&Rfc3339)
            .unwrap_or_else(|_| item.pubtime.to_string());
        println!("[{}] {} ({})", item.category, item.title, published);
        println!("    {}", item.url);
    }
}
