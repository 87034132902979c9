//! Conversion of Lambda event payloads into domain inputs

use aws_lambda_events::event::cloudwatch_logs::LogData;
use aws_lambda_events::event::dynamodb::Event as StreamEvent;
use summary_notifier_domain::{ChangeKind, FeedChange, FeedItem, LogBatch, LogLine};

/// Feed table stream records as changes; records with an unknown event
/// name are dropped.
pub fn feed_changes(event: StreamEvent) -> Vec<FeedChange> {
    event
        .records
        .into_iter()
        .filter_map(|record| {
            let Some(kind) = ChangeKind::parse(&record.event_name) else {
                tracing::warn!(event_name = %record.event_name, "Unknown stream event name");
                return None;
            };

            let item = if kind == ChangeKind::Remove {
                None
            } else {
                match serde_dynamo::from_item::<_, FeedItem>(record.change.new_image) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        tracing::error!(
                            event_id = %record.event_id,
                            error = %e,
                            "Failed to decode stream image"
                        );
                        None
                    }
                }
            };

            Some(FeedChange { kind, item })
        })
        .collect()
}

/// A decoded log subscription payload as a batch. Control messages carry
/// no log lines.
pub fn log_batch(data: LogData) -> LogBatch {
    let events = if data.message_type == "CONTROL_MESSAGE" {
        vec![]
    } else {
        data.log_events
            .into_iter()
            .map(|entry| LogLine {
                id: entry.id,
                timestamp: entry.timestamp,
                message: entry.message,
            })
            .collect()
    };

    LogBatch {
        log_group: data.log_group,
        log_stream: data.log_stream,
        events,
    }
}
