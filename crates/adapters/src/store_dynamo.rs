//! DynamoDB tables

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use summary_notifier_domain::{
    FeedItem, FeedItemStore, HistoryStore, ItemKey, NotificationRecord, PutOutcome, StoreError,
};

/// Source feed table; its stream drives the notifier
pub struct DynamoFeedStore {
    client: Client,
    table_name: String,
}

impl DynamoFeedStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl FeedItemStore for DynamoFeedStore {
    async fn put_if_absent(&self, item: &FeedItem) -> Result<PutOutcome, StoreError> {
        let attributes: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(item).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(attributes))
            .condition_expression("attribute_not_exists(#url)")
            .expression_attribute_names("#url", "url")
            .send()
            .await;

        match result {
            Ok(_) => Ok(PutOutcome::Inserted),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(PutOutcome::Duplicate)
            }
            Err(e) => Err(StoreError::Database(format!(
                "put_item on {}: {}",
                self.table_name,
                aws_sdk_dynamodb::error::DisplayErrorContext(&e)
            ))),
        }
    }
}

/// Notification history table
pub struct DynamoHistoryStore {
    client: Client,
    table_name: String,
}

impl DynamoHistoryStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl HistoryStore for DynamoHistoryStore {
    async fn contains(&self, key: &ItemKey) -> Result<bool, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_attributes(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| {
                StoreError::Database(format!(
                    "get_item on {}: {}",
                    self.table_name,
                    aws_sdk_dynamodb::error::DisplayErrorContext(&e)
                ))
            })?;

        Ok(output.item().is_some())
    }

    async fn record(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        let attributes: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(attributes))
            .send()
            .await
            .map_err(|e| {
                StoreError::Database(format!(
                    "put_item on {}: {}",
                    self.table_name,
                    aws_sdk_dynamodb::error::DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }
}

fn key_attributes(key: &ItemKey) -> HashMap<String, AttributeValue> {
    HashMap::from([
        ("url".to_string(), AttributeValue::S(key.url.clone())),
        (
            "notifier_name".to_string(),
            AttributeValue::S(key.notifier_name.clone()),
        ),
    ])
}
