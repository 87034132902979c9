//! Summarizer provider adapters

pub mod anthropic;
pub mod bedrock;
pub mod stub;

pub use anthropic::AnthropicSummarizer;
pub use bedrock::BedrockSummarizer;
pub use stub::StubSummarizer;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use summary_notifier_domain::{PromptVersion, SummarizeError, Summary, SummaryInput};

/// Assistant prefill that opens the answer
pub const PREFILL: &str = "<output>";

/// Common LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries on failure
    pub retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
            temperature: 0.5,
            top_p: 1.0,
            max_output_tokens: 4096,
            timeout_secs: 120,
            retries: 2,
        }
    }
}

impl LlmConfig {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

const OUTPUT_FORMAT: &str = "<outputFormat><thinking>(bullet points of the input)</thinking><summary>(final summary)</summary></outputFormat>";

const V1_INSTRUCTION: &str = r#"<instruction>Describe a new update in <input></input> tags in bullet points to describe "What is the new feature", "Who is this update good for". description shall be output in <thinking></thinking> tags and each thinking sentence must start with the bullet point "- " and end with "
". Make final summary as per <summaryRule></summaryRule> tags. Try to shorten output for easy reading. You are not allowed to utilize any information except in the input. output format shall be in accordance with <outputFormat></outputFormat> tags.</instruction>"#;

const V1_SUMMARY_RULE: &str = "<summaryRule>The final summary must consists of 1 or 2 sentences. Output format is defined in <outputFormat></outputFormat> tags.</summaryRule>";

const V2_AUDIENCE: &str = "<targetAudience>
Your readers have the following characteristics:
- Have basic knowledge of AWS services
- Want to understand daily updates efficiently and quickly
- Find AWS official announcements difficult to understand and prefer plain, easy-to-understand language
</targetAudience>";

const V2_INSTRUCTION: &str = r#"<instruction>Describe a new update in <input></input> tags in bullet points to describe "What is the new feature", "Who is this update good for". Keep in mind your target audience specified in <targetAudience></targetAudience> tags - use plain language instead of complex technical jargon, focus on practical benefits, and make the content easily digestible for busy professionals who need to stay updated efficiently. Description shall be output in <thinking></thinking> tags and each thinking sentence must start with the bullet point "- " and end with "
". Make final summary as per <summaryRule></summaryRule> tags. Try to shorten output for easy reading. You are not allowed to utilize any information except in the input. Output format shall be in accordance with <outputFormat></outputFormat> tags.</instruction>"#;

const V2_SUMMARY_RULE: &str = "<summaryRule>The final summary must consists of 1 or 2 sentences and should be written in plain language that busy AWS practitioners can quickly understand. Output format is defined in <outputFormat></outputFormat> tags.</summaryRule>";

/// Build the summarization prompt
pub fn build_summary_prompt(input: &SummaryInput) -> String {
    let mut prompt = String::from("\n");

    prompt.push_str(&format!("<input>{}</input>\n", input.article_text));
    prompt.push_str(&format!(
        "<persona>You are a professional {}. </persona>\n",
        input.persona
    ));

    let (instruction, summary_rule) = match input.prompt_version {
        PromptVersion::V1 => (V1_INSTRUCTION, V1_SUMMARY_RULE),
        PromptVersion::V2 => {
            prompt.push_str(V2_AUDIENCE);
            prompt.push('\n');
            (V2_INSTRUCTION, V2_SUMMARY_RULE)
        }
    };

    prompt.push_str(instruction);
    prompt.push('\n');
    prompt.push_str(&format!(
        "<outputLanguage>In {}.</outputLanguage>\n",
        input.output_language
    ));
    prompt.push_str(summary_rule);
    prompt.push('\n');
    prompt.push_str(OUTPUT_FORMAT);
    prompt.push_str("\nFollow the instruction.\n");

    prompt
}

static SUMMARY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<summary>([\s\S]*?)</summary>").expect("valid regex"));
static THINKING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<thinking>([\s\S]*?)</thinking>").expect("valid regex"));

/// Parse the model completion (without the prefill) into a summary
pub fn parse_summary_response(completion: &str) -> Result<Summary, String> {
    let text = format!("{}{}", PREFILL, completion);

    let summary = SUMMARY_TAG
        .captures(&text)
        .and_then(|c| c.get(1))
        .ok_or("No <summary> block in response")?
        .as_str();
    let detail = THINKING_TAG
        .captures(&text)
        .and_then(|c| c.get(1))
        .ok_or("No <thinking> block in response")?
        .as_str();

    Ok(Summary {
        summary: summary.to_string(),
        detail: detail.to_string(),
    })
}

/// Request completions until one parses, backing off between attempts.
/// Configuration errors end the loop at once.
pub(crate) async fn summarize_with_retries<F, Fut>(
    provider: &'static str,
    config: &LlmConfig,
    mut complete: F,
) -> Result<Summary, SummarizeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, SummarizeError>>,
{
    let mut attempt = 0;
    loop {
        let error = match complete().await {
            Ok(completion) => match parse_summary_response(&completion) {
                Ok(summary) => return Ok(summary),
                Err(e) => SummarizeError::InvalidFormat(e),
            },
            Err(e @ SummarizeError::Config(_)) => return Err(e),
            Err(e) => e,
        };

        if attempt >= config.retries {
            return Err(error);
        }
        attempt += 1;
        tracing::warn!(
            provider,
            attempt,
            model = %config.model,
            error = %error,
            "Retrying summarization"
        );
        tokio::time::sleep(Duration::from_millis(500 * 2_u64.pow(attempt))).await;
    }
}
