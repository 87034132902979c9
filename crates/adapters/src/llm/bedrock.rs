//! Amazon Bedrock adapter using the Converse API

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::config::Region;
use aws_sdk_bedrockruntime::error::SdkError;
use aws_sdk_bedrockruntime::operation::converse::ConverseError;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, InferenceConfiguration, Message,
};
use summary_notifier_domain::{SummarizeError, Summarizer, Summary, SummaryInput};

use super::{LlmConfig, PREFILL, build_summary_prompt, summarize_with_retries};

/// Summarizer backed by a Bedrock foundation model or inference profile
pub struct BedrockSummarizer {
    client: Client,
    config: LlmConfig,
}

impl BedrockSummarizer {
    /// Build a client for `region`, which may differ from the function's own region
    pub fn new(sdk_config: &aws_config::SdkConfig, region: &str, config: LlmConfig) -> Self {
        let bedrock_config = aws_sdk_bedrockruntime::config::Builder::from(sdk_config)
            .region(Region::new(region.to_string()))
            .build();

        Self {
            client: Client::from_conf(bedrock_config),
            config,
        }
    }

    async fn converse(&self, prompt: &str) -> Result<String, SummarizeError> {
        let messages = vec![
            message(ConversationRole::User, prompt)?,
            message(ConversationRole::Assistant, PREFILL)?,
        ];

        let response = self
            .client
            .converse()
            .model_id(&self.config.model)
            .set_messages(Some(messages))
            .inference_config(
                InferenceConfiguration::builder()
                    .max_tokens(self.config.max_output_tokens as i32)
                    .temperature(self.config.temperature)
                    .top_p(self.config.top_p)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error(&e))?;

        extract_text(response.output())
    }
}

fn message(role: ConversationRole, text: &str) -> Result<Message, SummarizeError> {
    Message::builder()
        .role(role)
        .content(ContentBlock::Text(text.to_string()))
        .build()
        .map_err(|e| SummarizeError::Config(format!("Failed to build message: {}", e)))
}

fn extract_text(output: Option<&ConverseOutput>) -> Result<String, SummarizeError> {
    let output = output
        .ok_or_else(|| SummarizeError::InvalidFormat("Converse response has no output".into()))?;
    let message = output
        .as_message()
        .map_err(|_| SummarizeError::InvalidFormat("Converse output is not a message".into()))?;

    let text = message
        .content()
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return Err(SummarizeError::InvalidFormat("Empty response".to_string()));
    }
    Ok(text)
}

fn map_sdk_error<R: std::fmt::Debug>(error: &SdkError<ConverseError, R>) -> SummarizeError {
    match error {
        SdkError::ServiceError(service_err) => match service_err.err() {
            ConverseError::ThrottlingException(_) => SummarizeError::RateLimited,
            ConverseError::ModelTimeoutException(_) => SummarizeError::Timeout,
            ConverseError::AccessDeniedException(e) => SummarizeError::Config(format!(
                "Access denied: {}",
                e.message().unwrap_or("unknown")
            )),
            ConverseError::ValidationException(e) => SummarizeError::Api(format!(
                "Validation error: {}",
                e.message().unwrap_or("unknown")
            )),
            ConverseError::ResourceNotFoundException(e) => SummarizeError::Config(format!(
                "Model not found: {}",
                e.message().unwrap_or("unknown")
            )),
            other => SummarizeError::Api(format!("Bedrock service error: {}", other)),
        },
        SdkError::TimeoutError(_) => SummarizeError::Timeout,
        SdkError::DispatchFailure(e) => SummarizeError::Api(format!("Connection error: {:?}", e)),
        _ => SummarizeError::Api(format!("AWS SDK error: {}", error)),
    }
}

#[async_trait]
impl Summarizer for BedrockSummarizer {
    async fn summarize(&self, input: SummaryInput) -> Result<Summary, SummarizeError> {
        let prompt = build_summary_prompt(&input);
        let prompt = prompt.as_str();
        summarize_with_retries(self.provider(), &self.config, move || self.converse(prompt)).await
    }

    fn provider(&self) -> &'static str {
        "bedrock"
    }
}
