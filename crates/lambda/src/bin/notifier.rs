//! Notifier function: consumes the feed table stream, summarizes new
//! entries and delivers them to each destination of their notifier.

use aws_config::BehaviorVersion;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use std::sync::Arc;
use summary_notifier_adapters::delivery::{HttpWebhookSender, SnsTopicPublisher};
use summary_notifier_adapters::feeds::HttpArticleFetcher;
use summary_notifier_adapters::llm::{
    AnthropicSummarizer, BedrockSummarizer, LlmConfig, StubSummarizer,
};
use summary_notifier_adapters::secrets::SsmSecretStore;
use summary_notifier_adapters::store::DynamoHistoryStore;
use summary_notifier_domain::{SecretStore, Summarizer, SummarizerProvider, SystemClock};
use summary_notifier_domain::usecases::{NotifyOutcome, NotifyUseCase};
use summary_notifier_lambda::{
    HTTP_TIMEOUT, NotifierSettings, batch_result, feed_changes, init_logging,
};

type Notifier = NotifyUseCase<
    DynamoHistoryStore,
    HttpArticleFetcher,
    dyn Summarizer,
    SsmSecretStore,
    HttpWebhookSender,
    SnsTopicPublisher,
    SystemClock,
>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let settings = NotifierSettings::from_env()?;
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;

    tracing::info!(
        provider = settings.provider.as_str(),
        model = %settings.model_id,
        region = %settings.model_region,
        notifiers = settings.notify.notifiers.len(),
        "Notifier starting"
    );

    let secrets = Arc::new(SsmSecretStore::new(aws_sdk_ssm::Client::new(&aws)));
    let summarizer = build_summarizer(&settings, &aws, secrets.as_ref()).await?;

    let usecase = NotifyUseCase::new(
        Arc::new(DynamoHistoryStore::new(
            aws_sdk_dynamodb::Client::new(&aws),
            &settings.table_name,
        )),
        Arc::new(HttpArticleFetcher::new(HTTP_TIMEOUT)?),
        summarizer,
        secrets,
        Arc::new(HttpWebhookSender::new(HTTP_TIMEOUT)?),
        Arc::new(SnsTopicPublisher::new(aws_sdk_sns::Client::new(&aws))),
        Arc::new(SystemClock),
        settings.notify.clone(),
    );

    lambda_runtime::run(service_fn(|event| handler(event, &usecase))).await
}

async fn build_summarizer(
    settings: &NotifierSettings,
    aws: &aws_config::SdkConfig,
    secrets: &SsmSecretStore,
) -> Result<Arc<dyn Summarizer>, Error> {
    let config = LlmConfig::with_model(&settings.model_id);
    let summarizer: Arc<dyn Summarizer> = match settings.provider {
        SummarizerProvider::Bedrock => Arc::new(BedrockSummarizer::new(
            aws,
            &settings.model_region,
            config,
        )),
        SummarizerProvider::Anthropic => {
            let parameter = settings
                .api_key_parameter
                .as_deref()
                .ok_or("ANTHROPIC_API_KEY_PARAMETER is not set")?;
            let api_key = secrets.get(parameter).await?;
            Arc::new(AnthropicSummarizer::new(api_key, config)?)
        }
        SummarizerProvider::Stub => Arc::new(StubSummarizer::echo()),
    };
    Ok(summarizer)
}

async fn handler(
    event: LambdaEvent<aws_lambda_events::event::dynamodb::Event>,
    usecase: &Notifier,
) -> Result<Vec<NotifyOutcome>, Error> {
    let changes = feed_changes(event.payload);
    tracing::info!(
        request_id = %event.context.request_id,
        records = changes.len(),
        "Stream batch received"
    );

    Ok(batch_result(usecase.handle(&changes).await)?)
}
