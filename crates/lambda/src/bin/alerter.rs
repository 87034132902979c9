//! Alerter function: receives error lines from the other functions' log
//! groups and republishes them to the alert topic.

use aws_config::BehaviorVersion;
use aws_lambda_events::event::cloudwatch_logs::LogsEvent;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use std::sync::Arc;
use summary_notifier_adapters::delivery::SnsTopicPublisher;
use summary_notifier_domain::usecases::{AlertReport, AlertUseCase};
use summary_notifier_lambda::{AlerterSettings, init_logging, log_batch};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let settings = AlerterSettings::from_env()?;
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;

    let usecase = AlertUseCase::new(
        Arc::new(SnsTopicPublisher::new(aws_sdk_sns::Client::new(&aws))),
        settings.topic_arn,
        settings.format,
    );

    lambda_runtime::run(service_fn(|event| handler(event, &usecase))).await
}

async fn handler(
    event: LambdaEvent<LogsEvent>,
    usecase: &AlertUseCase<SnsTopicPublisher>,
) -> Result<AlertReport, Error> {
    let batch = log_batch(event.payload.aws_logs.data);
    Ok(usecase.forward(&batch).await)
}
