//! Incoming-webhook delivery (Slack, Teams)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use summary_notifier_domain::{DeliveryError, WebhookSender};

/// Posts JSON documents to webhook URLs
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| DeliveryError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn post_json(
        &self,
        url: &SecretString,
        body: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        // The URL embeds a credential; never log it or let reqwest echo it.
        let response = self
            .client
            .post(url.expose_secret())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(server: &MockServer) -> SecretString {
        SecretString::from(format!("{}/services/T000/B000/XXXX", server.uri()))
    }

    #[tokio::test]
    async fn test_post_json() {
        let mock_server = MockServer::start().await;
        let body = json!({"rss_title": "S3 gets faster", "summary": "Faster."});

        Mock::given(method("POST"))
            .and(path("/services/T000/B000/XXXX"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(&body))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sender = HttpWebhookSender::new(Duration::from_secs(5)).unwrap();
        sender.post_json(&url(&mock_server), &body).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/services/T000/B000/XXXX"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
            .mount(&mock_server)
            .await;

        let sender = HttpWebhookSender::new(Duration::from_secs(5)).unwrap();
        let result = sender.post_json(&url(&mock_server), &json!({})).await;

        match result {
            Err(DeliveryError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "no_service");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
