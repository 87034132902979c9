//! Offline summarizer that makes no model calls

use async_trait::async_trait;
use summary_notifier_domain::{SummarizeError, Summarizer, Summary, SummaryInput};

/// Echoes the article title back as the summary
#[derive(Debug, Clone, Copy, Default)]
pub struct StubSummarizer;

impl StubSummarizer {
    pub fn echo() -> Self {
        Self
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, input: SummaryInput) -> Result<Summary, SummarizeError> {
        tracing::debug!(title = %input.title, "Echoing title as summary");
        Ok(Summary {
            detail: format!("- {}\n", input.title),
            summary: input.title,
        })
    }

    fn provider(&self) -> &'static str {
        "stub"
    }
}
