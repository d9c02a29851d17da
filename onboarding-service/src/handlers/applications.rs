use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::auth::{
        ApplicationListResponse, ApplicationResponse, ApproveApplicationRequest, RegisterRequest,
    },
    models::ApplicationStatus,
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

/// Submit a membership application
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Application submitted", body = ApplicationResponse),
        (status = 400, description = "Duplicate email or phone number", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 503, description = "Data store unavailable", body = ErrorResponse)
    ),
    tag = "Applications"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let application = state.onboarding.register(req.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse {
            success: true,
            message: "Application submitted".to_string(),
            application,
        }),
    ))
}

/// Approve or reject a pending application
#[utoipa::path(
    post,
    path = "/auth/approve-application",
    request_body = ApproveApplicationRequest,
    responses(
        (status = 200, description = "Decision recorded", body = ApplicationResponse),
        (status = 400, description = "Unknown decision status", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Insufficient roles", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse),
        (status = 409, description = "Application is not pending", body = ErrorResponse),
        (status = 503, description = "Identity provider unavailable", body = ErrorResponse)
    ),
    tag = "Applications",
    security(("bearer_auth" = []))
)]
pub async fn approve_application(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ApproveApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let decision: ApplicationStatus = req
        .status
        .parse()
        .map_err(|_| ServiceError::InvalidDecision(req.status.clone()))?;

    let application = state.onboarding.decide(req.application_id, decision).await?;

    let message = match application.status {
        ApplicationStatus::Approved => "Application approved; account created and credentials sent",
        _ => "Application rejected",
    };

    Ok(Json(ApplicationResponse {
        success: true,
        message: message.to_string(),
        application,
    }))
}

/// List every application
#[utoipa::path(
    get,
    path = "/auth/applications",
    responses(
        (status = 200, description = "All applications, newest first", body = ApplicationListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Insufficient roles", body = ErrorResponse)
    ),
    tag = "Applications",
    security(("bearer_auth" = []))
)]
pub async fn list_applications(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let applications = state.onboarding.list_applications().await?;
    Ok(Json(ApplicationListResponse {
        success: true,
        applications,
    }))
}

/// Return a decided application to pending
#[utoipa::path(
    post,
    path = "/auth/applications/revert-decision/{applicationId}",
    params(("applicationId" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "Decision reverted", body = ApplicationResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Insufficient roles", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse),
        (status = 409, description = "Application is already pending", body = ErrorResponse),
        (status = 503, description = "Identity provider unavailable", body = ErrorResponse)
    ),
    tag = "Applications",
    security(("bearer_auth" = []))
)]
pub async fn revert_decision(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let application = state.onboarding.revert(application_id).await?;
    Ok(Json(ApplicationResponse {
        success: true,
        message: "Decision reverted; application is pending again".to_string(),
        application,
    }))
}
