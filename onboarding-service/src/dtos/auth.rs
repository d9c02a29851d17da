use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Application, Principal};
use crate::services::NewApplication;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "applicant@example.com")]
    pub email: String,

    #[validate(length(min = 1, max = 32, message = "Phone number is required"))]
    #[schema(example = "+15550100")]
    pub phone_number: String,

    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    #[schema(example = "Ada")]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    #[schema(example = "Lovelace")]
    pub last_name: String,
}

impl From<RegisterRequest> for NewApplication {
    fn from(req: RegisterRequest) -> Self {
        NewApplication {
            email: req.email.trim().to_string(),
            phone_number: req.phone_number.trim().to_string(),
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Application submitted")]
    pub message: String,
    pub application: Application,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationListResponse {
    #[schema(example = true)]
    pub success: bool,
    pub applications: Vec<Application>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "applicant@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "Xy7!kq2Lm9@a")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Login successful")]
    pub message: String,
    pub user: Application,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Administrator decision on a pending application.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveApplicationRequest {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub application_id: Uuid,

    /// `APPROVED` or `REJECTED`.
    #[validate(length(min = 1, message = "Status is required"))]
    #[schema(example = "APPROVED")]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionResponse {
    #[schema(example = true)]
    pub connected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProtectedResponse {
    #[schema(example = "This is a protected route")]
    pub message: String,
    pub user: Principal,
}
