use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{ConnectionResponse, LoginRequest, LoginResponse, ProtectedResponse},
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Malformed authentication request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Application missing or not approved", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 503, description = "Identity provider unavailable", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.onboarding.login(&req.email, &req.password).await?;

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        user: outcome.application,
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
    }))
}

/// Checks the identity provider with a client-credentials grant
#[utoipa::path(
    get,
    path = "/auth/check-connection",
    responses(
        (status = 200, description = "Connectivity result", body = ConnectionResponse)
    ),
    tag = "Authentication"
)]
pub async fn check_connection(State(state): State<AppState>) -> impl IntoResponse {
    Json(ConnectionResponse {
        connected: state.onboarding.health_check().await,
    })
}

/// Echo the authenticated principal
#[utoipa::path(
    get,
    path = "/auth/protected",
    responses(
        (status = 200, description = "Authenticated principal", body = ProtectedResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn protected(AuthUser(principal): AuthUser) -> impl IntoResponse {
    Json(ProtectedResponse {
        message: "This is a protected route".to_string(),
        user: principal,
    })
}
