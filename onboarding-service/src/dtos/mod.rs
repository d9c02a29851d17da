pub mod auth;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body rendered by `AppError`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "validation_error")]
    pub error: String,
    #[schema(example = "An application with this email or phone number already exists")]
    pub message: String,
}
