use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("credential rejected")]
    InvalidCredential,
    #[error("identity provider unreachable: {0}")]
    ProviderUnavailable(String),
}

/// Validates operator bearer credentials. The identity provider itself is
/// external; this is just the narrow contract the merge endpoint needs.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<(), AuthError>;
}

/// Asks the identity provider whether the credential is valid.
pub struct HttpTokenValidator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTokenValidator {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status if status.as_u16() == 401 || status.as_u16() == 403 => {
                Err(AuthError::InvalidCredential)
            }
            status => Err(AuthError::ProviderUnavailable(format!(
                "unexpected status {status}"
            ))),
        }
    }
}

/// Dev validator: a single shared secret from configuration.
pub struct StaticTokenValidator {
    token: String,
}

impl StaticTokenValidator {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<(), AuthError> {
        if !self.token.is_empty() && token == self.token {
            Ok(())
        } else {
            Err(AuthError::InvalidCredential)
        }
    }
}
