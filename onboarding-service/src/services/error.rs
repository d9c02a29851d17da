use service_core::error::AppError;
use thiserror::Error;

/// Failures raised by the orchestrator, the identity provider clients and the
/// request guards.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("An application with this email or phone number already exists")]
    DuplicateApplication,

    #[error("Application not found")]
    ApplicationNotFound,

    #[error("Application is {actual}, operation requires {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid decision status: {0}")]
    InvalidDecision(String),

    #[error("Identity provider already holds an account for this email")]
    DuplicateAccount,

    #[error("Identity provider unavailable")]
    IdentityProviderUnavailable(#[source] anyhow::Error),

    #[error("Malformed authentication request")]
    MalformedAuthRequest,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied")]
    AccessDenied,

    #[error("Token endpoint not found")]
    TokenEndpointNotFound,

    #[error("Identity provider internal error")]
    IdentityProviderError,

    #[error("Authentication failed")]
    UnknownAuthError,

    #[error("No token provided")]
    MissingToken,

    #[error("Invalid token format")]
    MalformedToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("You do not have permission to access this resource")]
    InsufficientPermission,

    #[error("Storage error")]
    Storage(#[source] anyhow::Error),
}

impl ServiceError {
    pub fn idp_unavailable(err: impl Into<anyhow::Error>) -> Self {
        ServiceError::IdentityProviderUnavailable(err.into())
    }

    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        ServiceError::Storage(err.into())
    }

    /// Maps a token endpoint HTTP status onto a typed grant failure.
    pub fn from_grant_status(status: u16) -> Self {
        match status {
            400 => ServiceError::MalformedAuthRequest,
            401 => ServiceError::InvalidCredentials,
            403 => ServiceError::AccessDenied,
            404 => ServiceError::TokenEndpointNotFound,
            500 => ServiceError::IdentityProviderError,
            _ => ServiceError::UnknownAuthError,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::DuplicateApplication
            | ServiceError::InvalidDecision(_)
            | ServiceError::MalformedAuthRequest => AppError::Validation(message),
            ServiceError::ApplicationNotFound => AppError::NotFound(message),
            ServiceError::InvalidState { .. } | ServiceError::DuplicateAccount => {
                AppError::StateConflict(message)
            }
            ServiceError::InvalidCredentials
            | ServiceError::MissingToken
            | ServiceError::MalformedToken
            | ServiceError::InvalidToken => AppError::Authentication(message),
            ServiceError::AccessDenied | ServiceError::InsufficientPermission => {
                AppError::Authorization(message)
            }
            ServiceError::IdentityProviderUnavailable(source) | ServiceError::Storage(source) => {
                AppError::dependency(message, source)
            }
            ServiceError::TokenEndpointNotFound
            | ServiceError::IdentityProviderError
            | ServiceError::UnknownAuthError => {
                AppError::dependency(message, anyhow::anyhow!("token endpoint rejected request"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_statuses_map_to_typed_failures() {
        assert!(matches!(
            ServiceError::from_grant_status(400),
            ServiceError::MalformedAuthRequest
        ));
        assert!(matches!(
            ServiceError::from_grant_status(401),
            ServiceError::InvalidCredentials
        ));
        assert!(matches!(
            ServiceError::from_grant_status(403),
            ServiceError::AccessDenied
        ));
        assert!(matches!(
            ServiceError::from_grant_status(404),
            ServiceError::TokenEndpointNotFound
        ));
        assert!(matches!(
            ServiceError::from_grant_status(500),
            ServiceError::IdentityProviderError
        ));
        assert!(matches!(
            ServiceError::from_grant_status(502),
            ServiceError::UnknownAuthError
        ));
    }

    #[test]
    fn errors_map_onto_transport_taxonomy() {
        let cases: Vec<(ServiceError, &str)> = vec![
            (ServiceError::DuplicateApplication, "validation_error"),
            (ServiceError::ApplicationNotFound, "not_found"),
            (
                ServiceError::InvalidState {
                    expected: "PENDING",
                    actual: "APPROVED",
                },
                "state_conflict",
            ),
            (ServiceError::MissingToken, "authentication_error"),
            (ServiceError::InvalidToken, "authentication_error"),
            (ServiceError::InsufficientPermission, "authorization_error"),
            (ServiceError::AccessDenied, "authorization_error"),
            (
                ServiceError::idp_unavailable(anyhow::anyhow!("timeout")),
                "dependency_error",
            ),
            (
                ServiceError::storage(anyhow::anyhow!("pool closed")),
                "dependency_error",
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(AppError::from(err).kind(), kind);
        }
    }

    #[test]
    fn dependency_message_does_not_leak_cause() {
        let err = ServiceError::idp_unavailable(anyhow::anyhow!("client_secret=abc"));
        assert!(!err.to_string().contains("client_secret"));
    }
}
