//! summary-notifier Lambda functions
//!
//! Each binary in `src/bin` wires the adapters into one use case:
//! - `crawler`: scheduled feed crawl into the feed table
//! - `notifier`: feed table stream -> summary -> destinations
//! - `alerter`: log subscription -> alert topic

pub mod events;
pub mod settings;

pub use events::{feed_changes, log_batch};
pub use settings::{AlerterSettings, CrawlerSettings, NotifierSettings, SettingsError};

use std::time::Duration;
use summary_notifier_domain::usecases::NotifyOutcome;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Timeout for feed, article and webhook requests
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A stream batch with at least one record that could not be summarized
#[derive(Debug, Error)]
#[error("{failed} record(s) failed, first error: {first}")]
pub struct BatchError {
    pub failed: usize,
    pub first: String,
}

/// Fail the invocation when any record failed before delivery, so the
/// event source mapping redelivers it. With a batch size of 1 nothing was
/// delivered for the failed record.
pub fn batch_result(outcomes: Vec<NotifyOutcome>) -> Result<Vec<NotifyOutcome>, BatchError> {
    let errors: Vec<&String> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            NotifyOutcome::Failed { error } => Some(error),
            _ => None,
        })
        .collect();

    match errors.first() {
        None => Ok(outcomes),
        Some(first) => Err(BatchError {
            failed: errors.len(),
            first: first.to_string(),
        }),
    }
}

/// JSON logs on stdout; every line carries a `level` field for the error
/// subscription filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_current_span(false)
        .init();
}
