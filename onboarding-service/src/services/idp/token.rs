use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use service_core::observability::TracedRequestExt;
use tracing::instrument;

use crate::config::KeycloakConfig;
use crate::services::ServiceError;

/// Tokens returned by the realm token endpoint.
#[derive(Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Token exchanges against the identity provider.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Resource-owner password grant for an end user. No retry.
    async fn password_grant(&self, username: &str, password: &str)
        -> Result<TokenPair, ServiceError>;

    /// Client-credentials grant used as a connectivity check.
    async fn client_credentials_grant(&self) -> bool;
}

#[derive(Clone)]
pub struct KeycloakTokenClient {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: SecretString,
}

impl KeycloakTokenClient {
    pub fn new(http: reqwest::Client, config: &KeycloakConfig) -> Self {
        Self {
            http,
            token_endpoint: config.token_endpoint(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Service-principal token; used for the admin session as well as the connectivity check.
    pub async fn service_token(&self) -> Result<TokenPair, ServiceError> {
        self.request_token(&[("grant_type", "client_credentials")])
            .await
    }

    pub(crate) async fn request_token(
        &self,
        grant: &[(&str, &str)],
    ) -> Result<TokenPair, ServiceError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, endpoint = %self.token_endpoint, "Token endpoint unreachable");
                ServiceError::idp_unavailable(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Token request rejected");
            return Err(ServiceError::from_grant_status(status.as_u16()));
        }

        response.json::<TokenPair>().await.map_err(|e| {
            tracing::error!(error = %e, "Token endpoint returned an unreadable body");
            ServiceError::idp_unavailable(e)
        })
    }
}

#[async_trait]
impl TokenIssuer for KeycloakTokenClient {
    #[instrument(skip(self, password))]
    async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, ServiceError> {
        let tokens = self
            .request_token(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .await?;
        tracing::info!("User authenticated against identity provider");
        Ok(tokens)
    }

    async fn client_credentials_grant(&self) -> bool {
        match self.service_token().await {
            Ok(_) => {
                tracing::debug!("Identity provider connection ok");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity provider connection check failed");
                false
            }
        }
    }
}

/// Shared HTTP client for identity provider calls.
pub fn build_http_client(config: &KeycloakConfig) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build identity provider HTTP client: {}", e))
}
