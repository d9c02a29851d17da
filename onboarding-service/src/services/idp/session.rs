use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::sync::watch;

/// Bearer credential for the identity provider's admin API.
#[derive(Debug)]
pub struct AdminSession {
    access_token: SecretString,
}

impl AdminSession {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token: SecretString::new(access_token),
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// Shared slot holding the current admin session.
///
/// Readers take a snapshot and keep using it for the rest of their call; a
/// refresh swaps in a new value without waiting on them. Last write wins.
#[derive(Clone)]
pub struct AdminSessionCell {
    tx: Arc<watch::Sender<Option<Arc<AdminSession>>>>,
}

impl AdminSessionCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<Arc<AdminSession>> {
        self.tx.borrow().clone()
    }

    pub fn replace(&self, session: AdminSession) -> Arc<AdminSession> {
        let session = Arc::new(session);
        self.tx.send_replace(Some(session.clone()));
        session
    }
}

impl Default for AdminSessionCell {
    fn default() -> Self {
        Self::new()
    }
}
