//! Crawler function: invoked by a schedule rule with one notifier's
//! configuration, writes new feed entries to the feed table.

use aws_config::BehaviorVersion;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use std::sync::Arc;
use summary_notifier_adapters::feeds::RssFeedSource;
use summary_notifier_adapters::store::DynamoFeedStore;
use summary_notifier_domain::usecases::{CrawlReport, CrawlUseCase};
use summary_notifier_domain::{CrawlRequest, SystemClock};
use summary_notifier_lambda::{CrawlerSettings, HTTP_TIMEOUT, init_logging};

type Crawler = CrawlUseCase<RssFeedSource, DynamoFeedStore, SystemClock>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let settings = CrawlerSettings::from_env()?;
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;

    let usecase = CrawlUseCase::new(
        Arc::new(RssFeedSource::new(HTTP_TIMEOUT)?),
        Arc::new(DynamoFeedStore::new(
            aws_sdk_dynamodb::Client::new(&aws),
            &settings.table_name,
        )),
        Arc::new(SystemClock),
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<CrawlRequest>| {
        handler(event, &usecase, &settings)
    }))
    .await
}

async fn handler(
    event: LambdaEvent<CrawlRequest>,
    usecase: &Crawler,
    settings: &CrawlerSettings,
) -> Result<CrawlReport, Error> {
    let request = event.payload;
    tracing::info!(
        request_id = %event.context.request_id,
        notifier = %request.notifier_name,
        "Crawl requested"
    );

    Ok(usecase
        .crawl(&request.notifier_name, &request.notifier, settings.lookback_days)
        .await)
}
