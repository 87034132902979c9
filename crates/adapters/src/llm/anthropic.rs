//! Anthropic Messages API adapter

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use summary_notifier_domain::{SummarizeError, Summarizer, Summary, SummaryInput};

use super::{LlmConfig, PREFILL, build_summary_prompt, summarize_with_retries};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Summarizer calling the Messages API directly with an API key
pub struct AnthropicSummarizer {
    client: Client,
    api_key: SecretString,
    endpoint: String,
    config: LlmConfig,
}

impl AnthropicSummarizer {
    pub fn new(api_key: SecretString, config: LlmConfig) -> Result<Self, SummarizeError> {
        Self::with_base_url(api_key, config, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: SecretString,
        config: LlmConfig,
        base_url: &str,
    ) -> Result<Self, SummarizeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| SummarizeError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            config,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, SummarizeError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            messages: [
                Turn {
                    role: Role::User,
                    content: prompt,
                },
                Turn {
                    role: Role::Assistant,
                    content: PREFILL,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SummarizeError::Timeout
                } else {
                    SummarizeError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let reply: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::InvalidFormat(e.to_string()))?;

        tracing::debug!(
            stop_reason = reply.stop_reason.as_deref().unwrap_or("unknown"),
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            "Completion received"
        );
        if reply.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(
                max_tokens = self.config.max_output_tokens,
                "Completion hit the token limit"
            );
        }

        reply.text()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    messages: [Turn<'a>; 2],
}

#[derive(Serialize)]
struct Turn<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    User,
    Assistant,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

impl MessagesResponse {
    fn text(self) -> Result<String, SummarizeError> {
        let text: String = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                Block::Text { text } => Some(text),
                Block::Other => None,
            })
            .collect();

        if text.is_empty() {
            return Err(SummarizeError::InvalidFormat(
                "Completion has no text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Classify a failed response; credential and model errors are not retried
fn status_error(status: StatusCode, body: &str) -> SummarizeError {
    let (kind, message) = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => (error.kind, error.message),
        Err(_) => (String::new(), body.to_string()),
    };

    match (status.as_u16(), kind.as_str()) {
        (429 | 529, _) | (_, "rate_limit_error" | "overloaded_error") => {
            SummarizeError::RateLimited
        }
        (401 | 403, _) => SummarizeError::Config(format!("API key rejected: {}", message)),
        (404, _) => SummarizeError::Config(format!("Model not found: {}", message)),
        _ => SummarizeError::Api(format!("Messages API returned {}: {}", status, message)),
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    async fn summarize(&self, input: SummaryInput) -> Result<Summary, SummarizeError> {
        let prompt = build_summary_prompt(&input);
        let prompt = prompt.as_str();
        summarize_with_retries(self.provider(), &self.config, move || self.complete(prompt)).await
    }

    fn provider(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use summary_notifier_domain::PromptVersion;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn input() -> SummaryInput {
        SummaryInput {
            title: "S3 gets faster".to_string(),
            article_text: "Amazon S3 now serves reads twice as fast.".to_string(),
            persona: "solutions architect".to_string(),
            output_language: "English".to_string(),
            prompt_version: PromptVersion::V1,
        }
    }

    fn summarizer(uri: &str, retries: u32) -> AnthropicSummarizer {
        let config = LlmConfig {
            retries,
            ..LlmConfig::with_model("claude-3-haiku-20240307")
        };
        AnthropicSummarizer::with_base_url(SecretString::from("test-key"), config, uri).unwrap()
    }

    #[tokio::test]
    async fn test_summarize_sends_prefill_and_skips_non_text_blocks() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 4096,
                "messages": [{"role": "user"}, {"role": "assistant", "content": "<output>"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "thinking", "thinking": "reading the article"},
                    {"type": "text", "text": "<thinking>- Faster reads\n</thinking>"},
                    {"type": "text", "text": "<summary>S3 is faster.</summary></output>"}
                ],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 120, "output_tokens": 30}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let summary = summarizer(&mock_server.uri(), 0)
            .summarize(input())
            .await
            .unwrap();

        assert_eq!(summary.summary, "S3 is faster.");
        assert_eq!(summary.detail, "- Faster reads\n");
    }

    #[tokio::test]
    async fn test_overloaded_is_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&mock_server)
            .await;

        let result = summarizer(&mock_server.uri(), 0).summarize(input()).await;
        assert!(matches!(result, Err(SummarizeError::RateLimited)));
    }

    #[tokio::test]
    async fn test_rejected_key_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = summarizer(&mock_server.uri(), 2).summarize(input()).await;
        match result {
            Err(SummarizeError::Config(message)) => assert!(message.contains("invalid x-api-key")),
            other => panic!("unexpected result: {:?}", other.map(|s| s.summary)),
        }
    }

    #[tokio::test]
    async fn test_unparseable_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "no tags here"}]
            })))
            .mount(&mock_server)
            .await;

        let result = summarizer(&mock_server.uri(), 0).summarize(input()).await;
        assert!(matches!(result, Err(SummarizeError::InvalidFormat(_))));
    }

    #[test]
    fn test_status_error_without_json_body() {
        let error = status_error(StatusCode::BAD_GATEWAY, "upstream failed");
        assert!(matches!(error, SummarizeError::Api(m) if m.contains("upstream failed")));
    }
}
