use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request to notification provider failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("notification provider returned status {status}")]
    Provider { status: u16 },
}

/// Outbound templated-email provider. Consumed, not owned: callers in the
/// lead core log and swallow failures, the provider is never allowed to fail
/// an ingestion.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        data: &HashMap<String, String>,
    ) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct NotificationEnvelope<'a> {
    to: &'a str,
    subject: &'a str,
    data: &'a HashMap<String, String>,
}

/// Posts one JSON envelope per notification to the provider endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        data: &HashMap<String, String>,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&NotificationEnvelope {
                to: recipient,
                subject,
                data,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Provider {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

/// Dev backend: logs the send instead of calling a provider.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        data: &HashMap<String, String>,
    ) -> Result<(), NotifyError> {
        tracing::info!(recipient, subject, data = ?data, "notification");
        Ok(())
    }
}
