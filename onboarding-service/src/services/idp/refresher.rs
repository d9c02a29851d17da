use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::admin::IdpAdminGateway;
use crate::services::metrics;

/// Background task that keeps the admin session fresh.
///
/// Construction does nothing; `start` authenticates immediately and then on
/// every `interval`, `stop` cancels the timer and waits for any refresh that
/// is already running.
pub struct AdminCredentialRefresher {
    gateway: Arc<dyn IdpAdminGateway>,
    interval: Duration,
    shutdown_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AdminCredentialRefresher {
    pub fn new(gateway: Arc<dyn IdpAdminGateway>, interval: Duration) -> Self {
        Self {
            gateway,
            interval,
            shutdown_token: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.is_some() {
            tracing::warn!("Admin credential refresher already running");
            return;
        }

        let gateway = self.gateway.clone();
        let period = self.interval;
        let shutdown = self.shutdown_token.clone();

        tracing::info!(interval_secs = period.as_secs(), "Starting admin credential refresher");

        *handle = Some(tokio::spawn(async move {
            // First tick completes immediately.
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Admin credential refresher shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        refresh_once(gateway.as_ref()).await;
                    }
                }
            }
        }));
    }

    pub async fn stop(&self) {
        self.shutdown_token.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Admin credential refresher task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

async fn refresh_once(gateway: &dyn IdpAdminGateway) {
    match gateway.authenticate_admin().await {
        Ok(()) => {
            metrics::record_admin_refresh(true);
            tracing::debug!("Admin session refreshed");
        }
        Err(e) => {
            metrics::record_admin_refresh(false);
            tracing::error!(error = %e, "Admin session refresh failed; keeping previous session");
        }
    }
}
