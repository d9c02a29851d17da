//! Services layer: the application lifecycle orchestrator and the
//! collaborators it drives.

pub mod database;
pub mod email;
pub mod error;
pub mod idp;
mod jwt;
pub mod metrics;
mod onboarding;

pub use database::{ApplicationStore, Database, InMemoryApplicationStore};
pub use email::{CredentialMailer, EmailService, MockEmailService};
pub use error::ServiceError;
pub use jwt::{KeycloakJwtVerifier, TokenVerifier};
pub use onboarding::{LoginOutcome, NewApplication, OnboardingService};
