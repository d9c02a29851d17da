pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, request_id_of},
};
use service_core::observability::MetricsHandle;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, OnboardingConfig, SwaggerMode};
use crate::middleware::{auth_middleware, require_roles, RequiredRoles};
use crate::services::{ApplicationStore, OnboardingService, TokenVerifier};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::applications::register,
        handlers::applications::approve_application,
        handlers::applications::list_applications,
        handlers::applications::revert_decision,
        handlers::session::login,
        handlers::session::check_connection,
        handlers::session::protected,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::ApplicationResponse,
            dtos::auth::ApplicationListResponse,
            dtos::auth::ApproveApplicationRequest,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::ConnectionResponse,
            dtos::auth::ProtectedResponse,
            models::Application,
            models::ApplicationStatus,
            models::Principal,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Applications", description = "Membership application lifecycle"),
        (name = "Authentication", description = "Login and identity provider connectivity"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<OnboardingConfig>,
    pub onboarding: OnboardingService,
    pub store: Arc<dyn ApplicationStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub metrics: MetricsHandle,
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let admin_roles = RequiredRoles::any_of(&state.config.security.admin_roles);

    // Bearer token plus one of the admin roles.
    let admin_routes = Router::new()
        .route(
            "/auth/approve-application",
            post(handlers::approve_application),
        )
        .route("/auth/applications", get(handlers::list_applications))
        .route(
            "/auth/applications/revert-decision/:applicationId",
            post(handlers::revert_decision),
        )
        .layer(from_fn_with_state(admin_roles, require_roles))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let authenticated_routes = Router::new()
        .route("/auth/protected", get(handlers::protected))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/check-connection", get(handlers::check_connection))
        .merge(authenticated_routes)
        .merge(admin_routes);

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };
    if swagger_enabled {
        app = app.merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));
    }

    let origins = &state.config.security.allowed_origins;
    let allowed_origins = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>().map_err(|e| {
                    AppError::Config(anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?
            .into()
    };

    let app = app
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %request_id_of(request),
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Liveness plus a data store ping
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Data store unavailable", body = ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up"
        }
    })))
}
