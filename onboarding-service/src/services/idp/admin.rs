//! Realm admin API client.
//!
//! Every call borrows the current [`AdminSession`]. With no session yet the
//! client authenticates once first; a 401 from the admin API triggers one
//! re-authentication and exactly one retry.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedRequestExt;
use std::sync::Arc;
use tracing::instrument;

use super::session::{AdminSession, AdminSessionCell};
use super::token::KeycloakTokenClient;
use crate::config::KeycloakConfig;
use crate::services::ServiceError;

/// Account as listed by the admin API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccount {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[async_trait]
pub trait IdpAdminGateway: Send + Sync {
    /// Exchanges the service-principal credentials for a fresh admin session.
    async fn authenticate_admin(&self) -> Result<(), ServiceError>;

    /// Creates an enabled, pre-verified account and returns its remote id.
    async fn create_account(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<String, ServiceError>;

    /// Sets a permanent password credential.
    async fn set_credential(&self, account_id: &str, password: &str) -> Result<(), ServiceError>;

    async fn find_accounts_by_email(&self, email: &str)
        -> Result<Vec<RemoteAccount>, ServiceError>;

    /// Idempotent; an unknown account counts as deleted.
    async fn delete_account(&self, account_id: &str) -> Result<(), ServiceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewAccount<'a> {
    username: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    enabled: bool,
    email_verified: bool,
}

#[derive(Serialize)]
struct PasswordCredential<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
    temporary: bool,
}

#[derive(Clone)]
pub struct KeycloakAdminClient {
    http: reqwest::Client,
    admin_url: String,
    tokens: KeycloakTokenClient,
    /// Admin user for a password grant; `None` uses client credentials.
    admin_user: Option<(String, SecretString)>,
    session: AdminSessionCell,
}

impl KeycloakAdminClient {
    pub fn new(http: reqwest::Client, config: &KeycloakConfig, session: AdminSessionCell) -> Self {
        let admin_user = if config.admin_password.expose_secret().is_empty() {
            None
        } else {
            Some((config.admin_username.clone(), config.admin_password.clone()))
        };

        Self {
            tokens: KeycloakTokenClient::new(http.clone(), config),
            http,
            admin_url: config.admin_realm_url(),
            admin_user,
            session,
        }
    }

    pub fn session(&self) -> &AdminSessionCell {
        &self.session
    }

    async fn refresh_session(&self) -> Result<Arc<AdminSession>, ServiceError> {
        let grant = match &self.admin_user {
            Some((username, password)) => {
                self.tokens
                    .request_token(&[
                        ("grant_type", "password"),
                        ("username", username.as_str()),
                        ("password", password.expose_secret().as_str()),
                    ])
                    .await
            }
            None => self.tokens.service_token().await,
        };

        let tokens = grant.map_err(|e| match e {
            ServiceError::IdentityProviderUnavailable(_) => e,
            other => ServiceError::idp_unavailable(anyhow::anyhow!(
                "admin authentication rejected: {}",
                other
            )),
        })?;

        tracing::debug!(expires_in = ?tokens.expires_in, "Admin session obtained");
        Ok(self.session.replace(AdminSession::new(tokens.access_token)))
    }

    /// Sends an admin request built by `build` for a given bearer token.
    async fn send_admin<F>(&self, build: F) -> Result<Response, ServiceError>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let session = match self.session.current() {
            Some(session) => session,
            None => self.refresh_session().await?,
        };

        let response = Self::send(build(session.access_token())).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("Admin session rejected, re-authenticating");
        let session = self.refresh_session().await?;
        Self::send(build(session.access_token())).await
    }

    async fn send(request: RequestBuilder) -> Result<Response, ServiceError> {
        request.with_trace_context().send().await.map_err(|e| {
            tracing::error!(error = %e, "Admin API unreachable");
            ServiceError::idp_unavailable(e)
        })
    }

    fn users_url(&self) -> String {
        format!("{}/users", self.admin_url)
    }

    fn user_url(&self, account_id: &str) -> String {
        format!("{}/users/{}", self.admin_url, account_id)
    }
}

fn unexpected(operation: &str, status: StatusCode) -> ServiceError {
    tracing::error!(operation, status = status.as_u16(), "Admin API call failed");
    ServiceError::idp_unavailable(anyhow::anyhow!("{} returned {}", operation, status))
}

/// Trailing path segment of the `Location` header of a created resource.
fn created_id(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl IdpAdminGateway for KeycloakAdminClient {
    async fn authenticate_admin(&self) -> Result<(), ServiceError> {
        self.refresh_session().await.map(|_| ())
    }

    #[instrument(skip(self, first_name, last_name))]
    async fn create_account(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<String, ServiceError> {
        let url = self.users_url();
        let body = NewAccount {
            username: email,
            email,
            first_name,
            last_name,
            enabled: true,
            email_verified: true,
        };

        let response = self
            .send_admin(|token| self.http.post(&url).bearer_auth(token).json(&body))
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Err(ServiceError::DuplicateAccount),
            status if status.is_success() => {
                if let Some(id) = created_id(&response) {
                    tracing::info!(account_id = %id, "Remote account created");
                    return Ok(id);
                }
                // Older servers omit Location; look the account up instead.
                let account = self
                    .find_accounts_by_email(email)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        ServiceError::idp_unavailable(anyhow::anyhow!(
                            "created account not found by email"
                        ))
                    })?;
                tracing::info!(account_id = %account.id, "Remote account created");
                Ok(account.id)
            }
            status => Err(unexpected("create account", status)),
        }
    }

    #[instrument(skip(self, password))]
    async fn set_credential(&self, account_id: &str, password: &str) -> Result<(), ServiceError> {
        let url = format!("{}/reset-password", self.user_url(account_id));
        let body = PasswordCredential {
            kind: "password",
            value: password,
            temporary: false,
        };

        let response = self
            .send_admin(|token| self.http.put(&url).bearer_auth(token).json(&body))
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected("set credential", response.status()))
        }
    }

    #[instrument(skip(self))]
    async fn find_accounts_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<RemoteAccount>, ServiceError> {
        let url = self.users_url();
        let response = self
            .send_admin(|token| {
                self.http
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("email", email), ("exact", "true")])
            })
            .await?;

        if !response.status().is_success() {
            return Err(unexpected("find accounts", response.status()));
        }

        let accounts: Vec<RemoteAccount> = response
            .json()
            .await
            .map_err(ServiceError::idp_unavailable)?;

        // `exact` is ignored by some server versions, which then match substrings.
        Ok(accounts
            .into_iter()
            .filter(|a| {
                a.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, account_id: &str) -> Result<(), ServiceError> {
        let url = self.user_url(account_id);
        let response = self
            .send_admin(|token| self.http.delete(&url).bearer_auth(token))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::info!("Remote account already absent");
                Ok(())
            }
            status if status.is_success() => {
                tracing::info!("Remote account deleted");
                Ok(())
            }
            status => Err(unexpected("delete account", status)),
        }
    }
}
