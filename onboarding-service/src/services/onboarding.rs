//! Application lifecycle.
//!
//! The local store and the identity provider are two independently failing
//! systems with no shared transaction. Approve and revert mutate the identity
//! provider first and write the local status last, so a failure part way
//! through leaves the local record at its previous status. When the local
//! write itself fails after provisioning, the fresh remote account is
//! deleted again on a best-effort basis.
//!
//! Status writes are compare-and-set against the status read at the start of
//! the operation, so a concurrent decision on the same application makes the
//! slower one fail with a state conflict instead of overwriting it.

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{Application, ApplicationStatus};
use crate::services::database::ApplicationStore;
use crate::services::email::CredentialMailer;
use crate::services::idp::{IdpAdminGateway, TokenIssuer, TokenPair};
use crate::services::{metrics, ServiceError};
use crate::utils::generate_password;

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub application: Application,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct OnboardingService {
    store: Arc<dyn ApplicationStore>,
    idp: Arc<dyn IdpAdminGateway>,
    tokens: Arc<dyn TokenIssuer>,
    mailer: Arc<dyn CredentialMailer>,
}

impl OnboardingService {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        idp: Arc<dyn IdpAdminGateway>,
        tokens: Arc<dyn TokenIssuer>,
        mailer: Arc<dyn CredentialMailer>,
    ) -> Self {
        Self {
            store,
            idp,
            tokens,
            mailer,
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: NewApplication) -> Result<Application, ServiceError> {
        let request = NewApplication {
            email: normalize_email(&request.email),
            ..request
        };
        if self
            .store
            .find_by_email_or_phone(&request.email, &request.phone_number)
            .await?
            .is_some()
        {
            tracing::info!("Duplicate application rejected");
            return Err(ServiceError::DuplicateApplication);
        }

        let application = Application::new(
            request.email,
            request.phone_number,
            request.first_name,
            request.last_name,
        );
        self.store.create(&application).await?;

        tracing::info!(application_id = %application.id, "Application registered");
        Ok(application)
    }

    /// Dispatches an administrator decision to `approve` or `reject`.
    pub async fn decide(
        &self,
        id: Uuid,
        decision: ApplicationStatus,
    ) -> Result<Application, ServiceError> {
        match decision {
            ApplicationStatus::Approved => self.approve(id).await,
            ApplicationStatus::Rejected => self.reject(id).await,
            ApplicationStatus::Pending => Err(ServiceError::InvalidDecision(
                decision.as_str().to_string(),
            )),
        }
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, id: Uuid) -> Result<Application, ServiceError> {
        let mut application = self.load_pending(id).await?;
        let password = generate_password();

        let account_id = self
            .idp
            .create_account(
                &application.email,
                &application.first_name,
                &application.last_name,
            )
            .await?;

        if let Err(e) = self
            .idp
            .set_credential(&account_id, password.as_str())
            .await
        {
            self.discard_account(&account_id).await;
            return Err(e);
        }

        if let Err(e) = self
            .store
            .update_status(id, ApplicationStatus::Pending, ApplicationStatus::Approved)
            .await
        {
            self.discard_account(&account_id).await;
            return Err(e);
        }
        application.status = ApplicationStatus::Approved;
        application.updated_utc = Utc::now();
        metrics::record_decision(ApplicationStatus::Approved);
        tracing::info!(account_id = %account_id, "Application approved");

        match self
            .mailer
            .send_credential_email(&application.email, password.as_str())
            .await
        {
            Ok(()) => metrics::record_credential_email(true),
            Err(e) => {
                metrics::record_credential_email(false);
                tracing::error!(error = %e, "Credential email not delivered");
            }
        }

        Ok(application)
    }

    #[instrument(skip(self))]
    pub async fn reject(&self, id: Uuid) -> Result<Application, ServiceError> {
        let mut application = self.load_pending(id).await?;

        self.store
            .update_status(id, ApplicationStatus::Pending, ApplicationStatus::Rejected)
            .await?;
        application.status = ApplicationStatus::Rejected;
        application.updated_utc = Utc::now();
        metrics::record_decision(ApplicationStatus::Rejected);

        tracing::info!("Application rejected");
        Ok(application)
    }

    /// Returns a decided application to `PENDING`, removing its remote
    /// accounts first when it was approved.
    #[instrument(skip(self))]
    pub async fn revert(&self, id: Uuid) -> Result<Application, ServiceError> {
        let mut application = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound)?;

        if !application.status.is_revertible() {
            return Err(ServiceError::InvalidState {
                expected: "APPROVED or REJECTED",
                actual: application.status.as_str(),
            });
        }

        if application.status == ApplicationStatus::Approved {
            let accounts = self.idp.find_accounts_by_email(&application.email).await?;
            for account in &accounts {
                self.idp.delete_account(&account.id).await?;
                tracing::info!(account_id = %account.id, "Remote account removed");
            }
        }

        self.store
            .update_status(id, application.status, ApplicationStatus::Pending)
            .await?;
        application.status = ApplicationStatus::Pending;
        application.updated_utc = Utc::now();
        metrics::record_revert();

        tracing::info!("Application decision reverted");
        Ok(application)
    }

    /// The identity provider must accept the password and the local record
    /// must be approved.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let email = normalize_email(email);
        let tokens = self.tokens.password_grant(&email, password).await?;

        match self.store.find_by_email(&email).await? {
            Some(application) if application.status == ApplicationStatus::Approved => {
                Ok(LoginOutcome {
                    application,
                    tokens,
                })
            }
            other => {
                tracing::warn!(
                    status = other.as_ref().map(|a| a.status.as_str()),
                    "Login refused: application missing or not approved"
                );
                Err(ServiceError::AccessDenied)
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        self.tokens.client_credentials_grant().await
    }

    pub async fn list_applications(&self) -> Result<Vec<Application>, ServiceError> {
        self.store.find_many().await
    }

    async fn load_pending(&self, id: Uuid) -> Result<Application, ServiceError> {
        let application = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound)?;

        if !application.status.is_decidable() {
            return Err(ServiceError::InvalidState {
                expected: "PENDING",
                actual: application.status.as_str(),
            });
        }
        Ok(application)
    }

    async fn discard_account(&self, account_id: &str) {
        if let Err(e) = self.idp.delete_account(account_id).await {
            tracing::error!(
                error = %e,
                account_id,
                "Failed to remove remote account after aborted approval"
            );
        }
    }
}

/// Emails are stored and compared in one canonical form.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
