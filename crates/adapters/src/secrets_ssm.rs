//! SSM Parameter Store secrets

use async_trait::async_trait;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata};
use secrecy::SecretString;
use std::collections::BTreeSet;
use summary_notifier_domain::{SecretError, SecretStore};

/// `GetParameters` accepts at most this many names per call
const BATCH_SIZE: usize = 10;

/// Reads SecureString parameters holding webhook URLs and topic ARNs
pub struct SsmSecretStore {
    client: Client,
}

impl SsmSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Which of `names` exist in the parameter store
    pub async fn existing_parameters<I>(&self, names: I) -> Result<BTreeSet<String>, SecretError>
    where
        I: IntoIterator<Item = String>,
    {
        let names: Vec<String> = names.into_iter().collect();
        let mut found = BTreeSet::new();

        for chunk in names.chunks(BATCH_SIZE) {
            let output = self
                .client
                .get_parameters()
                .set_names(Some(chunk.to_vec()))
                .with_decryption(false)
                .send()
                .await
                .map_err(|e| {
                    if e.code() == Some("AccessDeniedException") {
                        SecretError::AccessDenied(e.message().unwrap_or("GetParameters").to_string())
                    } else {
                        SecretError::Api(DisplayErrorContext(&e).to_string())
                    }
                })?;

            found.extend(
                output
                    .parameters()
                    .iter()
                    .filter_map(|p| p.name().map(str::to_string)),
            );
        }

        Ok(found)
    }
}

#[async_trait]
impl SecretStore for SsmSecretStore {
    async fn get(&self, name: &str) -> Result<SecretString, SecretError> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|se| se.is_parameter_not_found())
                {
                    SecretError::NotFound(name.to_string())
                } else if e.code() == Some("AccessDeniedException") {
                    SecretError::AccessDenied(name.to_string())
                } else {
                    SecretError::Api(DisplayErrorContext(&e).to_string())
                }
            })?;

        let value = output
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| SecretError::NotFound(name.to_string()))?;

        Ok(SecretString::from(value.to_string()))
    }
}
