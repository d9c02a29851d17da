use onboarding_service::{
    build_router,
    config::OnboardingConfig,
    db,
    services::{
        idp::{
            build_http_client, AdminCredentialRefresher, AdminSessionCell, KeycloakAdminClient,
            KeycloakTokenClient,
        },
        Database, EmailService, KeycloakJwtVerifier, OnboardingService,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::observability::{init_metrics, init_tracing};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = OnboardingConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );
    let metrics = init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting onboarding service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::dependency("Database unavailable", e))?;
    db::run_migrations(&pool)
        .await
        .map_err(anyhow::Error::from)?;
    let store = Arc::new(Database::new(pool));

    let http = build_http_client(&config.keycloak).map_err(AppError::Config)?;
    let admin_client = Arc::new(KeycloakAdminClient::new(
        http.clone(),
        &config.keycloak,
        AdminSessionCell::new(),
    ));
    let token_client = Arc::new(KeycloakTokenClient::new(http, &config.keycloak));
    let verifier = Arc::new(KeycloakJwtVerifier::new(&config.token).map_err(AppError::Config)?);
    let mailer = Arc::new(EmailService::new(&config.smtp).map_err(AppError::Config)?);

    let onboarding = OnboardingService::new(
        store.clone(),
        admin_client.clone(),
        token_client,
        mailer,
    );

    let refresher =
        AdminCredentialRefresher::new(admin_client, config.keycloak.admin_refresh_interval());
    refresher.start();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let state = AppState {
        config: Arc::new(config),
        onboarding,
        store,
        verifier,
        metrics,
    };
    let app = build_router(state)?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    refresher.stop().await;
    served?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
