use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Transport-facing error.
///
/// Every variant renders as a stable machine-readable `error` kind plus a
/// human-readable `message`. Causes carried by `Dependency`, `Internal` and
/// `Config` are logged but never rendered.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Dependency error: {message}")]
    Dependency {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl AppError {
    pub fn dependency(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::Dependency {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Stable error kind exposed to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::StateConflict(_) => "state_conflict",
            AppError::Authentication(_) => "authentication_error",
            AppError::Authorization(_) => "authorization_error",
            AppError::Dependency { .. } => "dependency_error",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "configuration_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StateConflict(_) => StatusCode::CONFLICT,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Dependency { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(anyhow::Error::new(err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        let message = match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::StateConflict(msg)
            | AppError::Authentication(msg)
            | AppError::Authorization(msg) => msg,
            AppError::Dependency { message, source } => {
                tracing::error!(error = %source, kind, "Dependency failure");
                message
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, kind, "Internal failure");
                "Internal server error".to_string()
            }
            AppError::Config(err) => {
                tracing::error!(error = %err, kind, "Configuration failure");
                "Configuration error".to_string()
            }
        };

        (
            status,
            Json(ErrorBody {
                error: kind,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn renders_kind_and_message() {
        let response = AppError::StateConflict("Application is not PENDING".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["error"], "state_conflict");
        assert_eq!(body["message"], "Application is not PENDING");
    }

    #[tokio::test]
    async fn dependency_cause_is_not_rendered() {
        let err = AppError::dependency(
            "Identity provider unavailable",
            anyhow::anyhow!("connection refused: secret=hunter2"),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["error"], "dependency_error");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn internal_error_is_generic() {
        let response = AppError::Internal(anyhow::anyhow!("stack detail")).into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
    }
}
