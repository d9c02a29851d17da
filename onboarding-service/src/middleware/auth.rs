use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{
    models::Principal,
    services::{ServiceError, TokenVerifier},
    AppState,
};

/// Resolves the `Authorization: Bearer <token>` header into a principal.
///
/// Missing header is `MissingToken`, any other shape is `MalformedToken`, and
/// a failed or identity-less verification is `InvalidToken`.
pub async fn authenticate_bearer(
    headers: &HeaderMap,
    verifier: &dyn TokenVerifier,
) -> Result<Principal, ServiceError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ServiceError::MissingToken)?
        .to_str()
        .map_err(|_| ServiceError::MalformedToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.contains(char::is_whitespace))
        .ok_or(ServiceError::MalformedToken)?;

    match verifier.verify(token).await {
        Ok(Some(principal)) => Ok(principal),
        Ok(None) => {
            tracing::warn!("Verified token carried no subject");
            Err(ServiceError::InvalidToken)
        }
        Err(_) => Err(ServiceError::InvalidToken),
    }
}

/// Rejects unauthenticated requests and stores the [`Principal`] in the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = authenticate_bearer(req.headers(), state.verifier.as_ref())
        .await
        .inspect_err(|e| tracing::info!(reason = %e, "Bearer authentication failed"))?;

    tracing::Span::current().record("user_id", principal.user_id.as_str());
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Principal of an authenticated request.
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Principal missing from request extensions"
            ))
        })?;
        Ok(AuthUser(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::collections::BTreeSet;

    /// Accepts only the literal token `good`; `empty` verifies without a subject.
    struct StubVerifier;

    #[async_trait]
    impl TokenVerifier for StubVerifier {
        async fn verify(&self, token: &str) -> Result<Option<Principal>, ServiceError> {
            match token {
                "good" => Ok(Some(Principal {
                    user_id: "u1".to_string(),
                    username: None,
                    email: None,
                    roles: BTreeSet::new(),
                })),
                "empty" => Ok(None),
                _ => Err(ServiceError::InvalidToken),
            }
        }
    }

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[tokio::test]
    async fn missing_header_is_missing_token() {
        let result = authenticate_bearer(&headers(None), &StubVerifier).await;
        assert!(matches!(result, Err(ServiceError::MissingToken)));
    }

    #[tokio::test]
    async fn non_bearer_shapes_are_malformed() {
        for value in ["Basic abc", "Bearer", "Bearer ", "bearer good", "Bearer a b"] {
            let result = authenticate_bearer(&headers(Some(value)), &StubVerifier).await;
            assert!(
                matches!(result, Err(ServiceError::MalformedToken)),
                "{value} should be malformed"
            );
        }
    }

    #[tokio::test]
    async fn failed_or_empty_verification_is_invalid_token() {
        for value in ["Bearer bad", "Bearer empty"] {
            let result = authenticate_bearer(&headers(Some(value)), &StubVerifier).await;
            assert!(matches!(result, Err(ServiceError::InvalidToken)));
        }
    }

    #[tokio::test]
    async fn valid_token_yields_principal() {
        let principal = authenticate_bearer(&headers(Some("Bearer good")), &StubVerifier)
            .await
            .unwrap();
        assert_eq!(principal.user_id, "u1");
    }
}
