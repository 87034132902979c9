//! SNS topic delivery

use async_trait::async_trait;
use aws_sdk_sns::Client;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::types::MessageAttributeValue;
use std::collections::HashMap;
use summary_notifier_domain::{AttributeValue, DeliveryError, TopicMessage, TopicPublisher};

pub struct SnsTopicPublisher {
    client: Client,
}

impl SnsTopicPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TopicPublisher for SnsTopicPublisher {
    async fn publish(&self, topic_arn: &str, message: &TopicMessage) -> Result<(), DeliveryError> {
        let attributes = message_attributes(message)?;

        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(&message.body)
            .set_subject(message.subject.clone())
            .set_message_attributes(if attributes.is_empty() {
                None
            } else {
                Some(attributes)
            })
            .send()
            .await
            .map_err(|e| DeliveryError::Api(DisplayErrorContext(&e).to_string()))?;

        tracing::debug!(message_id = ?output.message_id(), "Published to topic");
        Ok(())
    }
}

fn message_attributes(
    message: &TopicMessage,
) -> Result<HashMap<String, MessageAttributeValue>, DeliveryError> {
    message
        .attributes
        .iter()
        .map(|(name, value)| {
            let (data_type, text) = match value {
                AttributeValue::String(s) => ("String", s),
                AttributeValue::Number(n) => ("Number", n),
            };
            let attribute = MessageAttributeValue::builder()
                .data_type(data_type)
                .string_value(text)
                .build()
                .map_err(|e| DeliveryError::Api(format!("attribute {}: {}", name, e)))?;
            Ok((name.clone(), attribute))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_attributes() {
        let mut message = TopicMessage::new("body");
        message
            .attributes
            .insert("level".to_string(), AttributeValue::String("ERROR".to_string()));
        message.attributes.insert(
            "eventTime".to_string(),
            AttributeValue::Number("1718020800000".to_string()),
        );

        let attributes = message_attributes(&message).unwrap();

        assert_eq!(attributes["level"].data_type(), "String");
        assert_eq!(attributes["level"].string_value(), Some("ERROR"));
        assert_eq!(attributes["eventTime"].data_type(), "Number");
        assert_eq!(attributes["eventTime"].string_value(), Some("1718020800000"));
    }
}
