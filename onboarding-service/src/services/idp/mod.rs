//! Identity provider clients: admin API, token endpoint and the background
//! admin session refresher.

mod admin;
mod mock;
mod refresher;
mod session;
mod token;

pub use admin::{IdpAdminGateway, KeycloakAdminClient, RemoteAccount};
pub use mock::{MockIdpAdminGateway, MockTokenIssuer};
pub use refresher::AdminCredentialRefresher;
pub use session::{AdminSession, AdminSessionCell};
pub use token::{build_http_client, KeycloakTokenClient, TokenIssuer, TokenPair};
