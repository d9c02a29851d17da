use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::admin::{IdpAdminGateway, RemoteAccount};
use super::token::{TokenIssuer, TokenPair};
use crate::services::ServiceError;

#[derive(Default)]
struct GatewayState {
    accounts: Vec<RemoteAccount>,
    credentials: HashMap<String, String>,
    next_id: u64,
    admin_authentications: usize,
    create_calls: usize,
    credential_calls: usize,
    deleted: Vec<String>,
    fail_admin_auth: bool,
    fail_create: bool,
    fail_credential: bool,
    /// Deletions still allowed to succeed; `None` means unlimited.
    deletes_left: Option<usize>,
}

/// In-memory identity provider admin API.
#[derive(Clone, Default)]
pub struct MockIdpAdminGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MockIdpAdminGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_admin_auth(&self, fail: bool) {
        self.lock().fail_admin_auth = fail;
    }

    pub fn fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn fail_credential(&self, fail: bool) {
        self.lock().fail_credential = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.lock().deletes_left = fail.then_some(0);
    }

    /// Lets the next `n` deletions through, then fails every later one.
    pub fn fail_delete_after(&self, n: usize) {
        self.lock().deletes_left = Some(n);
    }

    /// Pre-existing account, as if created out of band.
    pub fn seed_account(&self, email: &str) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("kc-{}", state.next_id);
        state.accounts.push(RemoteAccount {
            id: id.clone(),
            username: Some(email.to_string()),
            email: Some(email.to_string()),
            enabled: true,
        });
        id
    }

    pub fn accounts(&self) -> Vec<RemoteAccount> {
        self.lock().accounts.clone()
    }

    pub fn credential_of(&self, account_id: &str) -> Option<String> {
        self.lock().credentials.get(account_id).cloned()
    }

    pub fn admin_authentications(&self) -> usize {
        self.lock().admin_authentications
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn credential_calls(&self) -> usize {
        self.lock().credential_calls
    }

    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }
}

fn unavailable(what: &str) -> ServiceError {
    ServiceError::idp_unavailable(anyhow::anyhow!("{} unavailable", what))
}

#[async_trait]
impl IdpAdminGateway for MockIdpAdminGateway {
    async fn authenticate_admin(&self) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.admin_authentications += 1;
        if state.fail_admin_auth {
            return Err(unavailable("token endpoint"));
        }
        Ok(())
    }

    async fn create_account(
        &self,
        email: &str,
        _first_name: &str,
        _last_name: &str,
    ) -> Result<String, ServiceError> {
        let mut state = self.lock();
        state.create_calls += 1;
        if state.fail_create {
            return Err(unavailable("admin api"));
        }
        if state
            .accounts
            .iter()
            .any(|a| a.email.as_deref() == Some(email))
        {
            return Err(ServiceError::DuplicateAccount);
        }
        state.next_id += 1;
        let id = format!("kc-{}", state.next_id);
        state.accounts.push(RemoteAccount {
            id: id.clone(),
            username: Some(email.to_string()),
            email: Some(email.to_string()),
            enabled: true,
        });
        Ok(id)
    }

    async fn set_credential(&self, account_id: &str, password: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.credential_calls += 1;
        if state.fail_credential {
            return Err(unavailable("admin api"));
        }
        if !state.accounts.iter().any(|a| a.id == account_id) {
            return Err(unavailable("account"));
        }
        state
            .credentials
            .insert(account_id.to_string(), password.to_string());
        Ok(())
    }

    async fn find_accounts_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<RemoteAccount>, ServiceError> {
        Ok(self
            .lock()
            .accounts
            .iter()
            .filter(|a| a.email.as_deref() == Some(email))
            .cloned()
            .collect())
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        match state.deletes_left {
            Some(0) => return Err(unavailable("admin api")),
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        state.accounts.retain(|a| a.id != account_id);
        state.credentials.remove(account_id);
        state.deleted.push(account_id.to_string());
        Ok(())
    }
}

/// Token issuer that accepts a fixed set of `(username, password)` pairs.
#[derive(Clone, Default)]
pub struct MockTokenIssuer {
    users: Arc<Mutex<HashMap<String, String>>>,
    disconnected: Arc<Mutex<bool>>,
}

impl MockTokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, username: &str, password: &str) {
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(username.to_string(), password.to_string());
    }

    pub fn disconnect(&self, disconnected: bool) {
        *self.disconnected.lock().unwrap_or_else(|e| e.into_inner()) = disconnected;
    }
}

#[async_trait]
impl TokenIssuer for MockTokenIssuer {
    async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, ServiceError> {
        if *self.disconnected.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(unavailable("token endpoint"));
        }
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        match users.get(username) {
            Some(expected) if expected == password => Ok(TokenPair {
                access_token: format!("access-{}", username),
                refresh_token: Some(format!("refresh-{}", username)),
                expires_in: Some(300),
                token_type: Some("Bearer".to_string()),
            }),
            _ => Err(ServiceError::InvalidCredentials),
        }
    }

    async fn client_credentials_grant(&self) -> bool {
        !*self.disconnected.lock().unwrap_or_else(|e| e.into_inner())
    }
}
